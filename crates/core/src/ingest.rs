//! Snapshot ingestion into the analytics database
//!
//! Takes one snapshot payload (fresh from the agent or replayed from disk),
//! normalizes it, recomputes its delta against the stored predecessor, and
//! persists everything atomically. Ingestion is idempotent on snapshot id,
//! so replaying a directory of archived files is always safe.

use std::path::Path;

use crate::error::Result;
use crate::hiscore::{ActivityEntry, SkillEntry};
use crate::modes::SKILLS;
use crate::snapshot::{
    compute_delta, derive_snapshot_id, normalize, summarize, totals_from_skills, Delta,
    SnapshotFile,
};
use crate::storage::{Database, InsertOutcome, NewSnapshot};

/// Summary reported when a snapshot has no stored predecessor.
pub const INITIAL_SNAPSHOT_SUMMARY: &str = "Initial snapshot.";

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Inserted {
        snapshot_db_id: i64,
        delta: Option<Delta>,
        summary: String,
    },
    /// The snapshot id was already present; nothing was written.
    Skipped { snapshot_db_id: i64 },
}

/// Persist one snapshot file into the database.
///
/// Any delta carried by the file is ignored: the delta is recomputed against
/// the immediate predecessor actually present in the store, and a snapshot
/// with no predecessor gets no delta at all.
pub fn ingest_snapshot(db: &mut Database, file: &SnapshotFile) -> Result<IngestOutcome> {
    file.metadata.validate()?;

    let player = file.metadata.player.trim();
    let resolved_mode = file.metadata.resolved_mode;

    if let Some(id) = db.find_snapshot_db_id(&file.metadata.snapshot_id)? {
        return Ok(IngestOutcome::Skipped { snapshot_db_id: id });
    }

    let data = normalize(&file.data);
    let skills: Vec<SkillEntry> = data
        .skills
        .iter()
        .cloned()
        .map(backfill_skill_name)
        .filter(|entry| has_name(entry.name.as_deref()))
        .collect();
    let activities: Vec<ActivityEntry> = data
        .activities
        .iter()
        .filter(|entry| has_name(entry.name.as_deref()))
        .cloned()
        .collect();

    let (total_level, total_xp) = totals_from_skills(&skills);

    let account_id = match db.find_account_by_name(player)? {
        Some(account) => {
            db.set_default_mode(account.id, resolved_mode)?;
            account.id
        }
        None => db.create_account(player, Some(resolved_mode))?,
    };

    let previous = db.find_previous_snapshot(account_id, file.metadata.fetched_at)?;
    let (previous_snapshot_id, delta) = match &previous {
        Some(prev) => {
            let prev_payload = db.snapshot_payload(prev.id)?;
            let mut delta = compute_delta(&prev_payload, &data);
            let elapsed = file.metadata.fetched_at - prev.fetched_at;
            delta.time_diff_hours = Some(elapsed.num_seconds() as f64 / 3600.0);
            (Some(prev.id), Some(delta))
        }
        None => (None, None),
    };

    let outcome = db.insert_snapshot(
        account_id,
        &NewSnapshot {
            metadata: &file.metadata,
            total_level,
            total_xp,
            skills: &skills,
            activities: &activities,
            previous_snapshot_id,
            delta: delta.as_ref(),
        },
    )?;

    match outcome {
        InsertOutcome::AlreadyExists(id) => Ok(IngestOutcome::Skipped { snapshot_db_id: id }),
        InsertOutcome::Inserted(id) => {
            let summary = delta
                .as_ref()
                .map(summarize)
                .unwrap_or_else(|| INITIAL_SNAPSHOT_SUMMARY.to_string());
            tracing::info!(player, snapshot_db_id = id, %summary, "snapshot ingested");
            Ok(IngestOutcome::Inserted {
                snapshot_db_id: id,
                delta,
                summary,
            })
        }
    }
}

fn has_name(name: Option<&str>) -> bool {
    name.is_some_and(|n| !n.trim().is_empty())
}

/// Some archived payloads carry only the numeric table id per skill; the id
/// indexes the canonical skill list.
fn backfill_skill_name(mut entry: SkillEntry) -> SkillEntry {
    if entry.name.is_none() {
        if let Some(name) = entry
            .id
            .and_then(|id| usize::try_from(id).ok())
            .and_then(|idx| SKILLS.get(idx))
        {
            entry.name = Some((*name).to_string());
        }
    }
    entry
}

/// Per-category counts from a directory import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub accounts: u32,
    pub snapshots: u32,
    pub skills: u32,
    pub activities: u32,
    pub skipped: u32,
}

/// Import every `<root>/<player>/*.json` snapshot file, oldest file name
/// first per player. Unreadable files and duplicates count as skipped.
pub fn import_snapshot_dir(db: &mut Database, root: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    if !root.exists() {
        return Ok(stats);
    }

    let mut player_dirs: Vec<_> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    player_dirs.sort();

    for player_dir in player_dirs {
        let mut files: Vec<_> = std::fs::read_dir(&player_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for path in files {
            let mut file = match SnapshotFile::load(&path) {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable snapshot");
                    stats.skipped += 1;
                    continue;
                }
            };

            // Older archives predate stable ids; derive one from the file
            // name so re-imports stay idempotent.
            if file.metadata.snapshot_id.trim().is_empty() {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                file.metadata.snapshot_id = derive_snapshot_id(&file.metadata.player, &file_name);
            }

            if file.metadata.player.trim().is_empty() {
                stats.skipped += 1;
                continue;
            }

            let is_new_account = db
                .find_account_by_name(file.metadata.player.trim())?
                .is_none();

            match ingest_snapshot(db, &file) {
                Ok(IngestOutcome::Inserted { .. }) => {
                    if is_new_account {
                        stats.accounts += 1;
                    }
                    stats.snapshots += 1;
                    stats.skills += file.data.skills.len() as u32;
                    stats.activities += file.data.activities.len() as u32;
                }
                Ok(IngestOutcome::Skipped { .. }) => stats.skipped += 1,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to ingest snapshot");
                    stats.skipped += 1;
                }
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hiscore::HiscorePayload;
    use crate::modes::{GameMode, RequestedMode};
    use crate::snapshot::{SnapshotMetadata, SCHEMA_VERSION};
    use chrono::{DateTime, TimeZone, Utc};

    fn payload(magic_xp: i64, tempoross: i64) -> HiscorePayload {
        serde_json::from_str(&format!(
            r#"{{
                "skills": [
                    {{"name": "Magic", "level": 60, "xp": {magic_xp}}},
                    {{"name": "Fishing", "level": 63, "xp": 374447}}
                ],
                "activities": [{{"name": "Tempoross", "score": {tempoross}}}]
            }}"#
        ))
        .unwrap()
    }

    fn snapshot_file(snapshot_id: &str, fetched_at: DateTime<Utc>, magic_xp: i64) -> SnapshotFile {
        SnapshotFile {
            metadata: SnapshotMetadata {
                schema_version: SCHEMA_VERSION.to_string(),
                snapshot_id: snapshot_id.to_string(),
                player: "Tester".to_string(),
                requested_mode: RequestedMode::Auto,
                resolved_mode: GameMode::Ironman,
                fetched_at,
                fetched_at_unix: fetched_at.timestamp(),
                endpoint: None,
                latency_ms: None,
                agent_version: None,
            },
            data: payload(magic_xp, 80),
            delta: None,
        }
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_first_snapshot_has_no_delta() {
        let mut db = Database::open_in_memory().unwrap();
        let outcome = ingest_snapshot(&mut db, &snapshot_file("snap-1", ts(8), 300000)).unwrap();

        match outcome {
            IngestOutcome::Inserted { delta, summary, .. } => {
                assert!(delta.is_none());
                assert_eq!(summary, "Initial snapshot.");
            }
            IngestOutcome::Skipped { .. } => panic!("expected insert"),
        }
    }

    #[test]
    fn test_second_snapshot_gets_recomputed_delta() {
        let mut db = Database::open_in_memory().unwrap();
        ingest_snapshot(&mut db, &snapshot_file("snap-1", ts(8), 300000)).unwrap();

        let outcome = ingest_snapshot(&mut db, &snapshot_file("snap-2", ts(10), 320000)).unwrap();
        match outcome {
            IngestOutcome::Inserted {
                delta,
                summary,
                snapshot_db_id,
            } => {
                let delta = delta.unwrap();
                assert_eq!(delta.total_xp_delta, 20000);
                assert_eq!(delta.time_diff_hours, Some(2.0));
                assert!(summary.contains("ΔXP"));
                assert!(db.get_delta(snapshot_db_id).unwrap().is_some());
            }
            IngestOutcome::Skipped { .. } => panic!("expected insert"),
        }
    }

    #[test]
    fn test_reingest_same_id_is_skipped() {
        let mut db = Database::open_in_memory().unwrap();
        ingest_snapshot(&mut db, &snapshot_file("snap-1", ts(8), 300000)).unwrap();
        let outcome = ingest_snapshot(&mut db, &snapshot_file("snap-1", ts(8), 300000)).unwrap();

        assert!(matches!(outcome, IngestOutcome::Skipped { .. }));
        assert_eq!(db.count_snapshots().unwrap(), 1);
    }

    #[test]
    fn test_file_delta_is_ignored_without_predecessor() {
        let mut db = Database::open_in_memory().unwrap();
        let mut file = snapshot_file("snap-1", ts(8), 300000);
        file.delta = Some(Delta {
            total_xp_delta: 99999,
            ..Default::default()
        });

        let outcome = ingest_snapshot(&mut db, &file).unwrap();
        match outcome {
            IngestOutcome::Inserted { delta, .. } => assert!(delta.is_none()),
            IngestOutcome::Skipped { .. } => panic!("expected insert"),
        }
    }

    #[test]
    fn test_skill_names_backfilled_from_table_id() {
        let mut db = Database::open_in_memory().unwrap();
        let mut file = snapshot_file("snap-1", ts(8), 300000);
        file.data = serde_json::from_str(
            r#"{"skills": [{"id": 7, "level": 60, "xp": 300000}], "activities": []}"#,
        )
        .unwrap();

        let IngestOutcome::Inserted { snapshot_db_id, .. } =
            ingest_snapshot(&mut db, &file).unwrap()
        else {
            panic!("expected insert");
        };

        let stored = db.snapshot_payload(snapshot_db_id).unwrap();
        assert_eq!(stored.skills[0].name.as_deref(), Some("Magic"));
    }

    #[test]
    fn test_validation_rejects_empty_snapshot_id() {
        let mut db = Database::open_in_memory().unwrap();
        let file = snapshot_file("", ts(8), 300000);
        assert!(ingest_snapshot(&mut db, &file).is_err());
        assert_eq!(db.count_snapshots().unwrap(), 0);
    }

    #[test]
    fn test_import_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("snapshots");

        for (name, hour) in [("20260801_080000.json", 8), ("20260801_100000.json", 10)] {
            let file = snapshot_file(&format!("snap-{hour}"), ts(hour), 300000 + hour as i64);
            file.save(&root.join("Tester").join(name)).unwrap();
        }

        let mut db = Database::open_in_memory().unwrap();
        let stats = import_snapshot_dir(&mut db, &root).unwrap();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.snapshots, 2);
        assert_eq!(stats.skills, 4);
        assert_eq!(stats.skipped, 0);

        let again = import_snapshot_dir(&mut db, &root).unwrap();
        assert_eq!(again.snapshots, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(db.count_snapshots().unwrap(), 2);
    }
}
