//! Persistent cache of resolved gamemodes per player
//!
//! A single JSON file mapping player names to their last resolved mode,
//! loaded eagerly and flushed explicitly. Concurrent processes sharing the
//! same file overwrite each other last-writer-wins; the cache is a probe
//! shortcut, so a lost update only costs extra probes on the next pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::modes::GameMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRecord {
    pub mode: GameMode,
    pub updated_at: DateTime<Utc>,
}

/// Keeps track of the last known gamemode per player.
#[derive(Debug)]
pub struct ModeCache {
    path: PathBuf,
    entries: HashMap<String, ModeRecord>,
    dirty: bool,
}

impl ModeCache {
    /// Load the cache file, treating a missing or unreadable file as empty.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "ignoring corrupt mode cache");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, player: &str) -> Option<GameMode> {
        self.entries.get(player).map(|record| record.mode)
    }

    /// Record a resolution. Re-recording the same mode leaves the cache
    /// clean so `persist` stays a no-op.
    pub fn update(&mut self, player: &str, mode: GameMode) {
        if let Some(existing) = self.entries.get(player) {
            if existing.mode == mode {
                return;
            }
        }
        self.entries.insert(
            player.to_string(),
            ModeRecord {
                mode,
                updated_at: Utc::now(),
            },
        );
        self.dirty = true;
    }

    /// Serialize the whole mapping to disk if anything changed.
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
