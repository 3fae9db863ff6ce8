//! OSRS hiscore API integration

pub mod client;
pub mod types;

pub use client::{FetchOutcome, HiscoreClient, HiscoreFetch, HiscoreResponse};
pub use types::{ActivityEntry, HiscorePayload, SkillEntry};
