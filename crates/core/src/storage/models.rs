//! Database row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modes::GameMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub default_mode: Option<GameMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub id: i64,
    pub snapshot_id: String,
    pub account_id: i64,
    pub fetched_at: DateTime<Utc>,
    pub total_xp: i64,
    pub total_level: i64,
    pub requested_mode: Option<String>,
    pub resolved_mode: Option<String>,
    pub endpoint: Option<String>,
    pub latency_ms: Option<f64>,
    pub agent_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDelta {
    pub current_snapshot_id: i64,
    pub previous_snapshot_id: Option<i64>,
    pub total_xp_delta: i64,
    pub skill_deltas: String,
    pub activity_deltas: String,
    pub time_diff_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clan {
    pub id: i64,
    pub name: String,
}
