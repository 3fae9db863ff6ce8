//! Batch snapshot agent
//!
//! Coordinates resolve, fetch, archive, and ingest for a batch of accounts.
//! Every account yields its own outcome; a miss or transport failure on one
//! account never aborts the rest of the batch.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::hiscore::{FetchOutcome, HiscoreFetch};
use crate::ingest::{ingest_snapshot, IngestOutcome};
use crate::mode_cache::ModeCache;
use crate::modes::{GameMode, RequestedMode};
use crate::resolver::{ModeResolver, Resolution};
use crate::snapshot::{derive_snapshot_id, SnapshotFile, SnapshotMetadata, SCHEMA_VERSION};
use crate::storage::Database;

#[derive(Debug, Clone)]
pub struct AccountSpec {
    pub name: String,
    pub mode: RequestedMode,
}

impl AccountSpec {
    pub fn new(name: impl Into<String>, mode: RequestedMode) -> Self {
        Self {
            name: name.into(),
            mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub player: String,
    pub mode: Option<GameMode>,
    pub snapshot_path: Option<PathBuf>,
    pub success: bool,
    pub message: String,
    pub summary: Option<String>,
}

impl AgentOutcome {
    fn failure(player: &str, message: impl Into<String>) -> Self {
        Self {
            player: player.to_string(),
            mode: None,
            snapshot_path: None,
            success: false,
            message: message.into(),
            summary: None,
        }
    }
}

/// Coordinates snapshot fetch, archival, and database ingestion.
pub struct SnapshotAgent<F> {
    fetcher: F,
    output_dir: PathBuf,
}

impl<F: HiscoreFetch> SnapshotAgent<F> {
    pub fn new(fetcher: F, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.into(),
        }
    }

    pub async fn run(
        &self,
        db: &mut Database,
        cache: &mut ModeCache,
        accounts: &[AccountSpec],
    ) -> Vec<AgentOutcome> {
        let mut outcomes = Vec::with_capacity(accounts.len());

        for account in accounts {
            let outcome = match self.snapshot_account(db, cache, account).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(player = %account.name, %err, "snapshot failed");
                    AgentOutcome::failure(&account.name, err.to_string())
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn snapshot_account(
        &self,
        db: &mut Database,
        cache: &mut ModeCache,
        account: &AccountSpec,
    ) -> Result<AgentOutcome> {
        let player = account.name.trim();
        let resolver = ModeResolver::new(&self.fetcher);

        let resolved = match resolver.resolve(cache, player, account.mode, false).await? {
            Resolution::Found(resolved) => resolved,
            Resolution::NotFound { .. } => {
                return Ok(AgentOutcome::failure(player, "Player not found"));
            }
        };

        let started = Instant::now();
        let response = match self.fetcher.fetch(player, resolved.mode).await? {
            FetchOutcome::Found(response) => response,
            // The player vanished between resolution and fetch.
            FetchOutcome::NotFound => {
                return Ok(AgentOutcome::failure(player, "Player not found"));
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let fetched_at = Utc::now();
        let file_name = fetched_at.format("%Y%m%d_%H%M%S.json").to_string();
        let path = self
            .output_dir
            .join(player.replace(' ', "_"))
            .join(&file_name);

        let file = SnapshotFile {
            metadata: SnapshotMetadata {
                schema_version: SCHEMA_VERSION.to_string(),
                snapshot_id: derive_snapshot_id(player, &file_name),
                player: player.to_string(),
                requested_mode: account.mode,
                resolved_mode: resolved.mode,
                fetched_at,
                fetched_at_unix: fetched_at.timestamp(),
                endpoint: Some(response.url),
                latency_ms: Some(latency_ms),
                agent_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            data: response.data,
            delta: None,
        };
        file.save(&path)?;

        let (message, summary) = match ingest_snapshot(db, &file)? {
            IngestOutcome::Inserted { summary, .. } => ("Snapshot stored", Some(summary)),
            IngestOutcome::Skipped { .. } => ("Snapshot already ingested", None),
        };

        Ok(AgentOutcome {
            player: player.to_string(),
            mode: Some(resolved.mode),
            snapshot_path: Some(path),
            success: true,
            message: message.to_string(),
            summary,
        })
    }
}
