//! Snapshot payloads, metadata, and the on-disk JSON format

pub mod delta;
pub mod normalize;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hiscore::{HiscorePayload, SkillEntry};
use crate::modes::{GameMode, RequestedMode};

pub use delta::{compute_delta, format_number, summarize, ActivityDelta, Delta, SkillDelta};
pub use normalize::normalize;

pub const SCHEMA_VERSION: &str = "1.1";

/// Everything recorded about one fetch besides the hiscore data itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub snapshot_id: String,
    pub player: String,
    #[serde(default = "default_requested_mode")]
    pub requested_mode: RequestedMode,
    #[serde(default = "default_resolved_mode")]
    pub resolved_mode: GameMode,
    pub fetched_at: DateTime<Utc>,
    pub fetched_at_unix: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

// Archives written before mode resolution landed carry neither mode field.
fn default_requested_mode() -> RequestedMode {
    RequestedMode::Auto
}

fn default_resolved_mode() -> GameMode {
    crate::modes::DEFAULT_MODE
}

impl SnapshotMetadata {
    /// Reject snapshots that could never be keyed or attributed. Runs before
    /// any write touches the store.
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_id.trim().is_empty() {
            return Err(Error::Validation("empty snapshot id".into()));
        }
        if self.player.trim().is_empty() {
            return Err(Error::Validation("empty player name".into()));
        }
        Ok(())
    }
}

/// One snapshot as persisted to `data/snapshots/<player>/<timestamp>.json`.
/// The `delta` field is advisory: ingestion recomputes it against whatever
/// predecessor the database actually holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub metadata: SnapshotMetadata,
    pub data: HiscorePayload,
    #[serde(default)]
    pub delta: Option<Delta>,
}

impl SnapshotFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Stable snapshot identifier derived from the player and source file name,
/// so re-ingesting the same file always lands on the same id.
pub fn derive_snapshot_id(player: &str, file_name: &str) -> String {
    let name = format!("osrs:snapshot:{player}:{file_name}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Total level and XP for a skill set.
///
/// The "Overall" row is authoritative when it carries values; otherwise the
/// totals are summed over the remaining skills. "Overall" itself is never
/// part of the fallback sum.
pub fn totals_from_skills(skills: &[SkillEntry]) -> (i64, i64) {
    let mut total_level = 0;
    let mut total_xp = 0;

    for skill in skills {
        if is_overall(skill) {
            total_level = skill.level.unwrap_or(0);
            total_xp = skill.xp.unwrap_or(0);
            break;
        }
    }

    if total_level == 0 {
        total_level = skills
            .iter()
            .filter(|skill| !is_overall(skill))
            .map(|skill| skill.level.unwrap_or(0))
            .sum();
    }
    if total_xp == 0 {
        total_xp = skills
            .iter()
            .filter(|skill| !is_overall(skill))
            .map(|skill| skill.xp.unwrap_or(0))
            .sum();
    }

    (total_level, total_xp)
}

fn is_overall(skill: &SkillEntry) -> bool {
    skill
        .name
        .as_deref()
        .is_some_and(|name| name.trim().eq_ignore_ascii_case("overall"))
}
