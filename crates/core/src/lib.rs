//! OSRS Tracker Core Library

pub mod agent;
pub mod aggregate;
pub mod error;
pub mod hiscore;
pub mod ingest;
pub mod mode_cache;
pub mod modes;
pub mod report;
pub mod resolver;
pub mod snapshot;
pub mod storage;

pub use agent::{AccountSpec, AgentOutcome, SnapshotAgent};
pub use error::{Error, Result};
pub use hiscore::{HiscoreClient, HiscoreFetch};
pub use mode_cache::ModeCache;
pub use modes::{GameMode, RequestedMode};
pub use resolver::{ModeResolver, Resolution};
pub use storage::Database;
