//! SQLite storage for accounts, snapshots, and clans

mod db;
mod models;

pub use db::{Database, InsertOutcome, NewSnapshot, SnapshotQuery, SortOrder};
pub use models::*;
