//! Database operations

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::models::*;
use crate::error::Result;
use crate::hiscore::{ActivityEntry, HiscorePayload, SkillEntry};
use crate::modes::GameMode;
use crate::snapshot::{Delta, SnapshotMetadata};

const SNAPSHOT_COLUMNS: &str = "id, snapshot_id, account_id, fetched_at, total_xp, total_level, \
     requested_mode, resolved_mode, endpoint, latency_ms, agent_version";

/// Upper bound used when a query has no `until`; RFC-3339 text sorts
/// lexicographically, so this caps every real timestamp.
const TS_MAX: &str = "9999-12-31T23:59:59Z";

/// All rows destined for one snapshot, written in a single transaction.
#[derive(Debug)]
pub struct NewSnapshot<'a> {
    pub metadata: &'a SnapshotMetadata,
    pub total_level: i64,
    pub total_xp: i64,
    pub skills: &'a [SkillEntry],
    pub activities: &'a [ActivityEntry],
    pub previous_snapshot_id: Option<i64>,
    pub delta: Option<&'a Delta>,
}

/// Result of an idempotent snapshot insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    AlreadyExists(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub order: SortOrder,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                default_mode TEXT
            );

            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id TEXT UNIQUE NOT NULL,
                account_id INTEGER NOT NULL,
                fetched_at TEXT NOT NULL,
                total_xp INTEGER NOT NULL,
                total_level INTEGER NOT NULL,
                requested_mode TEXT,
                resolved_mode TEXT,
                endpoint TEXT,
                latency_ms REAL,
                agent_version TEXT,
                metadata TEXT,
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                level INTEGER,
                xp INTEGER,
                rank INTEGER,
                FOREIGN KEY (snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                score INTEGER,
                rank INTEGER,
                FOREIGN KEY (snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS snapshots_deltas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                current_snapshot_id INTEGER NOT NULL,
                previous_snapshot_id INTEGER,
                total_xp_delta INTEGER NOT NULL,
                skill_deltas TEXT NOT NULL,
                activity_deltas TEXT NOT NULL,
                time_diff_hours REAL,
                FOREIGN KEY (current_snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE,
                FOREIGN KEY (previous_snapshot_id) REFERENCES snapshots(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS clans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS clan_members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                clan_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                UNIQUE (clan_id, account_id),
                FOREIGN KEY (clan_id) REFERENCES clans(id) ON DELETE CASCADE,
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_account_fetched
                ON snapshots(account_id, fetched_at);
            CREATE INDEX IF NOT EXISTS idx_skills_snapshot ON skills(snapshot_id);
            CREATE INDEX IF NOT EXISTS idx_activities_snapshot ON activities(snapshot_id);
            CREATE INDEX IF NOT EXISTS idx_deltas_current
                ON snapshots_deltas(current_snapshot_id);
            "#,
        )?;
        Ok(())
    }

    // ── accounts ─────────────────────────────────────────────────────────

    pub fn find_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                "SELECT id, name, default_mode FROM accounts WHERE name = ?1",
                params![name.trim()],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    pub fn create_account(&self, name: &str, default_mode: Option<GameMode>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO accounts (name, default_mode) VALUES (?1, ?2)",
            params![name.trim(), default_mode.map(|mode| mode.as_str())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn set_default_mode(&self, account_id: i64, mode: GameMode) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET default_mode = ?1 WHERE id = ?2",
            params![mode.as_str(), account_id],
        )?;
        Ok(())
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, default_mode FROM accounts ORDER BY name")?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn count_accounts(&self) -> Result<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── snapshots ────────────────────────────────────────────────────────

    pub fn find_snapshot_db_id(&self, snapshot_id: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM snapshots WHERE snapshot_id = ?1",
                params![snapshot_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Insert one snapshot with its skills, activities, and delta in a
    /// single transaction. A snapshot id already present in the store makes
    /// the whole call a no-op reported as `AlreadyExists`.
    pub fn insert_snapshot(&mut self, account_id: i64, snap: &NewSnapshot) -> Result<InsertOutcome> {
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM snapshots WHERE snapshot_id = ?1",
                params![snap.metadata.snapshot_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(InsertOutcome::AlreadyExists(id));
        }

        tx.execute(
            r#"
            INSERT INTO snapshots (
                snapshot_id, account_id, fetched_at, total_xp, total_level,
                requested_mode, resolved_mode, endpoint, latency_ms, agent_version, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                snap.metadata.snapshot_id,
                account_id,
                fmt_ts(snap.metadata.fetched_at),
                snap.total_xp,
                snap.total_level,
                snap.metadata.requested_mode.as_str(),
                snap.metadata.resolved_mode.as_str(),
                snap.metadata.endpoint,
                snap.metadata.latency_ms,
                snap.metadata.agent_version,
                serde_json::to_string(snap.metadata)?,
            ],
        )?;
        let snapshot_db_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO skills (snapshot_id, name, level, xp, rank)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for skill in snap.skills {
                stmt.execute(params![
                    snapshot_db_id,
                    skill.name,
                    skill.level,
                    skill.xp,
                    skill.rank,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO activities (snapshot_id, name, score, rank)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for activity in snap.activities {
                stmt.execute(params![
                    snapshot_db_id,
                    activity.name,
                    activity.score,
                    activity.rank,
                ])?;
            }
        }

        if let Some(delta) = snap.delta {
            tx.execute(
                r#"
                INSERT INTO snapshots_deltas (
                    current_snapshot_id, previous_snapshot_id,
                    total_xp_delta, skill_deltas, activity_deltas, time_diff_hours
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    snapshot_db_id,
                    snap.previous_snapshot_id,
                    delta.total_xp_delta,
                    serde_json::to_string(&delta.skill_deltas)?,
                    serde_json::to_string(&delta.activity_deltas)?,
                    delta.time_diff_hours,
                ],
            )?;
        }

        tx.commit()?;
        Ok(InsertOutcome::Inserted(snapshot_db_id))
    }

    /// Most recent snapshot strictly earlier than `before`.
    pub fn find_previous_snapshot(
        &self,
        account_id: i64,
        before: DateTime<Utc>,
    ) -> Result<Option<StoredSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
             WHERE account_id = ?1 AND fetched_at < ?2
             ORDER BY fetched_at DESC LIMIT 1"
        );
        let snapshot = self
            .conn
            .query_row(&sql, params![account_id, fmt_ts(before)], snapshot_from_row)
            .optional()?;
        Ok(snapshot)
    }

    pub fn latest_snapshot(&self, account_id: i64) -> Result<Option<StoredSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
             WHERE account_id = ?1
             ORDER BY fetched_at DESC LIMIT 1"
        );
        let snapshot = self
            .conn
            .query_row(&sql, params![account_id], snapshot_from_row)
            .optional()?;
        Ok(snapshot)
    }

    pub fn list_snapshots(
        &self,
        account_id: i64,
        query: &SnapshotQuery,
    ) -> Result<Vec<StoredSnapshot>> {
        let direction = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
             WHERE account_id = ?1 AND fetched_at >= ?2 AND fetched_at <= ?3
             ORDER BY fetched_at {direction} LIMIT ?4"
        );

        let since = query.since.map(fmt_ts).unwrap_or_default();
        let until = query.until.map(fmt_ts).unwrap_or_else(|| TS_MAX.to_string());
        let limit = query.limit.map(i64::from).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&sql)?;
        let snapshots = stmt
            .query_map(params![account_id, since, until, limit], snapshot_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    pub fn count_snapshots(&self) -> Result<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Skill and activity rows of a stored snapshot, as a payload suitable
    /// for delta computation.
    pub fn snapshot_payload(&self, snapshot_db_id: i64) -> Result<HiscorePayload> {
        let mut stmt = self.conn.prepare(
            "SELECT name, level, xp, rank FROM skills WHERE snapshot_id = ?1 ORDER BY id",
        )?;
        let skills = stmt
            .query_map(params![snapshot_db_id], |row| {
                Ok(SkillEntry {
                    id: None,
                    name: row.get(0)?,
                    level: row.get(1)?,
                    xp: row.get(2)?,
                    rank: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT name, score, rank FROM activities WHERE snapshot_id = ?1 ORDER BY id",
        )?;
        let activities = stmt
            .query_map(params![snapshot_db_id], |row| {
                Ok(ActivityEntry {
                    id: None,
                    name: row.get(0)?,
                    score: row.get(1)?,
                    rank: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(HiscorePayload { skills, activities })
    }

    pub fn get_delta(&self, snapshot_db_id: i64) -> Result<Option<StoredDelta>> {
        let delta = self
            .conn
            .query_row(
                "SELECT current_snapshot_id, previous_snapshot_id, total_xp_delta,
                        skill_deltas, activity_deltas, time_diff_hours
                 FROM snapshots_deltas WHERE current_snapshot_id = ?1",
                params![snapshot_db_id],
                |row| {
                    Ok(StoredDelta {
                        current_snapshot_id: row.get(0)?,
                        previous_snapshot_id: row.get(1)?,
                        total_xp_delta: row.get(2)?,
                        skill_deltas: row.get(3)?,
                        activity_deltas: row.get(4)?,
                        time_diff_hours: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(delta)
    }

    /// Delete one snapshot; skills, activities, and delta rows cascade.
    pub fn delete_snapshot(&self, snapshot_db_id: i64) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM snapshots WHERE id = ?1",
            params![snapshot_db_id],
        )?;
        Ok(affected > 0)
    }

    // ── clans ────────────────────────────────────────────────────────────

    pub fn create_clan(&self, name: &str) -> Result<i64> {
        self.conn
            .execute("INSERT INTO clans (name) VALUES (?1)", params![name.trim()])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_clan(&self, clan_id: i64) -> Result<Option<Clan>> {
        let clan = self
            .conn
            .query_row(
                "SELECT id, name FROM clans WHERE id = ?1",
                params![clan_id],
                |row| {
                    Ok(Clan {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(clan)
    }

    pub fn add_clan_member(&self, clan_id: i64, account_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO clan_members (clan_id, account_id) VALUES (?1, ?2)",
            params![clan_id, account_id],
        )?;
        Ok(())
    }

    /// Clan members in membership insertion order; this ordering is the
    /// leaderboard tie-break, so it must stay stable.
    pub fn clan_members(&self, clan_id: i64) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.name, a.default_mode
             FROM clan_members cm
             JOIN accounts a ON cm.account_id = a.id
             WHERE cm.clan_id = ?1
             ORDER BY cm.id",
        )?;
        let members = stmt
            .query_map(params![clan_id], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let default_mode: Option<String> = row.get(2)?;
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        default_mode: default_mode.as_deref().and_then(GameMode::parse_str),
    })
}

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredSnapshot> {
    Ok(StoredSnapshot {
        id: row.get(0)?,
        snapshot_id: row.get(1)?,
        account_id: row.get(2)?,
        fetched_at: parse_row_ts(row.get(3)?)?,
        total_xp: row.get(4)?,
        total_level: row.get(5)?,
        requested_mode: row.get(6)?,
        resolved_mode: row.get(7)?,
        endpoint: row.get(8)?,
        latency_ms: row.get(9)?,
        agent_version: row.get(10)?,
    })
}

/// Timestamps are stored as RFC-3339 text at fixed seconds precision so
/// lexicographic comparison in SQL matches chronological order.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_row_ts(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(err))
        })
}
