//! End-to-end snapshot flow: ingest, delta, window aggregation, report.

use chrono::{DateTime, TimeZone, Utc};

use osrs_tracker_core::aggregate::{self, LeaderboardMetric, Timeframe};
use osrs_tracker_core::hiscore::HiscorePayload;
use osrs_tracker_core::ingest::{ingest_snapshot, IngestOutcome};
use osrs_tracker_core::modes::{GameMode, RequestedMode};
use osrs_tracker_core::report::build_report;
use osrs_tracker_core::snapshot::{SnapshotFile, SnapshotMetadata, SCHEMA_VERSION};
use osrs_tracker_core::Database;

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap()
}

fn snapshot_file(
    snapshot_id: &str,
    fetched_at: DateTime<Utc>,
    magic: (i64, i64),
    fishing_xp: i64,
    tempoross: i64,
) -> SnapshotFile {
    let data: HiscorePayload = serde_json::from_str(&format!(
        r#"{{
            "skills": [
                {{"name": "Magic", "rank": 120000, "level": {}, "xp": {}}},
                {{"name": "Fishing", "rank": 90000, "level": 63, "xp": {}}}
            ],
            "activities": [
                {{"name": "Tempoross", "rank": -1, "score": {}}}
            ]
        }}"#,
        magic.0, magic.1, fishing_xp, tempoross
    ))
    .unwrap();

    SnapshotFile {
        metadata: SnapshotMetadata {
            schema_version: SCHEMA_VERSION.to_string(),
            snapshot_id: snapshot_id.to_string(),
            player: "Tester".to_string(),
            requested_mode: RequestedMode::Auto,
            resolved_mode: GameMode::Ironman,
            fetched_at,
            fetched_at_unix: fetched_at.timestamp(),
            endpoint: Some("stub://hiscore".to_string()),
            latency_ms: Some(42.0),
            agent_version: Some("test".to_string()),
        },
        data,
        delta: None,
    }
}

#[test]
fn snapshot_chain_produces_delta_and_aggregates() {
    let mut db = Database::open_in_memory().unwrap();

    let first = snapshot_file("snap-1", ts(8), (60, 300000), 374447, 80);
    let outcome = ingest_snapshot(&mut db, &first).unwrap();
    let IngestOutcome::Inserted { delta, summary, .. } = outcome else {
        panic!("first snapshot should insert");
    };
    assert!(delta.is_none());
    assert_eq!(summary, "Initial snapshot.");

    let second = snapshot_file("snap-2", ts(10), (61, 320000), 380000, 85);
    let outcome = ingest_snapshot(&mut db, &second).unwrap();
    let IngestOutcome::Inserted {
        delta,
        summary,
        snapshot_db_id,
    } = outcome
    else {
        panic!("second snapshot should insert");
    };

    let delta = delta.unwrap();
    assert_eq!(delta.total_xp_delta, 25553);
    assert_eq!(delta.skill_deltas[0].name, "Magic");
    assert_eq!(delta.skill_deltas[0].xp_delta, 20000);
    assert_eq!(delta.skill_deltas[0].level_delta, 1);
    assert_eq!(delta.skill_deltas[1].name, "Fishing");
    assert_eq!(delta.skill_deltas[1].xp_delta, 5553);
    assert_eq!(delta.activity_deltas[0].name, "Tempoross");
    assert_eq!(delta.activity_deltas[0].score_delta, 5);
    assert!(summary.contains("ΔXP"));
    assert!(summary.contains("Magic"));
    assert!(summary.contains("Tempoross"));

    // negative sentinel ranks were normalized away before persisting
    let stored = db.snapshot_payload(snapshot_db_id).unwrap();
    let tempoross = stored
        .activities
        .iter()
        .find(|activity| activity.name.as_deref() == Some("Tempoross"))
        .unwrap();
    assert_eq!(tempoross.rank, None);

    // window aggregation over the two endpoints
    let account = db.find_account_by_name("Tester").unwrap().unwrap();
    assert_eq!(account.default_mode, Some(GameMode::Ironman));

    let clan_id = db.create_clan("Solo Clan").unwrap();
    db.add_clan_member(clan_id, account.id).unwrap();

    let now = ts(12);
    let stats = aggregate::clan_stats(&db, clan_id, Timeframe::AllTime, now).unwrap();
    assert_eq!(stats.totals.xp_gain, 25553);
    assert_eq!(stats.totals.level_gain, 1);
    assert_eq!(stats.leaderboard.len(), 1);
    assert_eq!(stats.leaderboard[0].xp_gain, 25553);
    assert!(!stats.current_standings);

    let page = aggregate::clan_leaderboard(
        &db,
        clan_id,
        Timeframe::AllTime,
        LeaderboardMetric::Xp,
        1,
        10,
        now,
    )
    .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].name, "Tester");

    // report over the second snapshot with its recomputed delta
    let mut reported = second.clone();
    reported.delta = Some(delta);
    let report = build_report(&reported);
    assert!(report.contains("# OSRS Snapshot Report — Tester"));
    assert!(report.contains("ΔXP 25,553"));
    assert!(report.contains("| Magic | 61 | 320,000 |"));
}

#[test]
fn reingesting_archived_files_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("snapshots");

    let first = snapshot_file("snap-1", ts(8), (60, 300000), 374447, 80);
    first
        .save(&root.join("Tester").join("20260801_080000.json"))
        .unwrap();

    let mut db = Database::open_in_memory().unwrap();
    let stats = osrs_tracker_core::ingest::import_snapshot_dir(&mut db, &root).unwrap();
    assert_eq!(stats.snapshots, 1);

    let stats = osrs_tracker_core::ingest::import_snapshot_dir(&mut db, &root).unwrap();
    assert_eq!(stats.snapshots, 0);
    assert_eq!(stats.skipped, 1);
    assert_eq!(db.count_snapshots().unwrap(), 1);
}
