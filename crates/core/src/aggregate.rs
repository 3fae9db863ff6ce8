//! Windowed gain aggregation for accounts and clans
//!
//! Gains over a timeframe compare only the earliest and latest snapshots
//! inside the window. Summing the per-snapshot deltas in between would
//! double count whenever a snapshot chain overlaps the window edge, so the
//! intermediate snapshots are deliberately ignored.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::snapshot::{compute_delta, Delta};
use crate::storage::{Database, SnapshotQuery, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Week,
    Month,
    MonthToDate,
    AllTime,
}

impl Timeframe {
    /// Parse from query string parameter.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7d" => Some(Timeframe::Week),
            "30d" => Some(Timeframe::Month),
            "mtd" => Some(Timeframe::MonthToDate),
            "all" | "all time" | "alltime" => Some(Timeframe::AllTime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Week => "7d",
            Timeframe::Month => "30d",
            Timeframe::MonthToDate => "mtd",
            Timeframe::AllTime => "all",
        }
    }

    /// Inclusive lower bound of the window; `None` means unbounded.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Week => Some(now - chrono::Duration::days(7)),
            Timeframe::Month => Some(now - chrono::Duration::days(30)),
            Timeframe::MonthToDate => {
                let first = now
                    .date_naive()
                    .with_day(1)
                    .expect("day 1 is valid for every month");
                Some(first.and_time(NaiveTime::MIN).and_utc())
            }
            Timeframe::AllTime => None,
        }
    }
}

/// Gains for one account over a window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowGains {
    pub xp_gain: i64,
    pub level_gain: i64,
    pub delta: Delta,
    /// Snapshots found inside the window. Fewer than two means there was
    /// nothing to compare, and the gains are zero by definition.
    pub snapshots: usize,
}

impl WindowGains {
    fn zero(snapshots: usize) -> Self {
        Self {
            xp_gain: 0,
            level_gain: 0,
            delta: Delta::default(),
            snapshots,
        }
    }
}

pub fn account_window_gains(
    db: &Database,
    account_id: i64,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<WindowGains> {
    let snapshots = db.list_snapshots(
        account_id,
        &SnapshotQuery {
            since: timeframe.lower_bound(now),
            order: SortOrder::Ascending,
            ..Default::default()
        },
    )?;

    if snapshots.len() < 2 {
        return Ok(WindowGains::zero(snapshots.len()));
    }

    let baseline = &snapshots[0];
    let latest = &snapshots[snapshots.len() - 1];

    let baseline_payload = db.snapshot_payload(baseline.id)?;
    let latest_payload = db.snapshot_payload(latest.id)?;

    let mut delta = compute_delta(&baseline_payload, &latest_payload);
    let elapsed = latest.fetched_at - baseline.fetched_at;
    delta.time_diff_hours = Some(elapsed.num_seconds() as f64 / 3600.0);

    let level_gain = delta.skill_deltas.iter().map(|s| s.level_delta).sum();

    Ok(WindowGains {
        xp_gain: delta.total_xp_delta,
        level_gain,
        delta,
        snapshots: snapshots.len(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillAggregate {
    pub name: String,
    pub xp_gain: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityAggregate {
    pub name: String,
    pub total: i64,
    pub top_member: Option<String>,
    pub top_value: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClanTotals {
    pub members: usize,
    pub xp: i64,
    pub level: i64,
    pub xp_gain: i64,
    pub level_gain: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub name: String,
    pub xp_gain: i64,
    pub level_gain: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClanStats {
    pub clan_id: i64,
    pub timeframe: String,
    pub since: Option<DateTime<Utc>>,
    pub totals: ClanTotals,
    pub leaderboard: Vec<LeaderboardRow>,
    pub top_skills: Vec<SkillAggregate>,
    pub top_activities: Vec<ActivityAggregate>,
    /// True when the window produced no activity gains and the figures show
    /// current absolute standings instead.
    pub current_standings: bool,
}

const TOP_LIMIT: usize = 10;

/// Aggregate window gains across a clan's members.
///
/// Per-skill and per-activity aggregates sum positive member gains only; a
/// member going backwards never cancels another member's progress.
pub fn clan_stats(
    db: &Database,
    clan_id: i64,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<ClanStats> {
    let members = db.clan_members(clan_id)?;
    let since = timeframe.lower_bound(now);

    let mut totals = ClanTotals {
        members: members.len(),
        ..Default::default()
    };
    let mut per_skill: HashMap<String, i64> = HashMap::new();
    let mut per_activity: HashMap<String, i64> = HashMap::new();
    let mut per_activity_top: HashMap<String, (String, i64)> = HashMap::new();
    let mut per_activity_current: HashMap<String, (String, i64)> = HashMap::new();
    let mut leaderboard = Vec::new();

    for member in &members {
        if let Some(latest) = db.latest_snapshot(member.id)? {
            totals.xp += latest.total_xp;
            totals.level += latest.total_level;

            // Current highs per activity, kept for the fallback display.
            let payload = db.snapshot_payload(latest.id)?;
            for activity in &payload.activities {
                let (Some(name), Some(score)) = (activity.name.as_deref(), activity.score) else {
                    continue;
                };
                let entry = per_activity_current
                    .entry(name.to_string())
                    .or_insert_with(|| (member.name.clone(), score));
                if score > entry.1 {
                    *entry = (member.name.clone(), score);
                }
            }
        }

        let gains = account_window_gains(db, member.id, timeframe, now)?;

        for skill in &gains.delta.skill_deltas {
            *per_skill.entry(skill.name.clone()).or_insert(0) += skill.xp_delta;
        }
        for activity in &gains.delta.activity_deltas {
            *per_activity.entry(activity.name.clone()).or_insert(0) += activity.score_delta;
            let entry = per_activity_top
                .entry(activity.name.clone())
                .or_insert_with(|| (member.name.clone(), activity.score_delta));
            if activity.score_delta > entry.1 {
                *entry = (member.name.clone(), activity.score_delta);
            }
        }

        totals.xp_gain += gains.xp_gain;
        totals.level_gain += gains.level_gain;
        leaderboard.push(LeaderboardRow {
            name: member.name.clone(),
            xp_gain: gains.xp_gain,
            level_gain: gains.level_gain,
        });
    }

    // Stable sort: ties keep clan-membership insertion order.
    leaderboard.sort_by(|a, b| b.xp_gain.cmp(&a.xp_gain));

    let mut top_skills: Vec<SkillAggregate> = per_skill
        .into_iter()
        .map(|(name, xp_gain)| SkillAggregate { name, xp_gain })
        .collect();
    top_skills.sort_by(|a, b| b.xp_gain.cmp(&a.xp_gain).then(a.name.cmp(&b.name)));
    top_skills.truncate(TOP_LIMIT);

    let mut top_activities: Vec<ActivityAggregate> = per_activity
        .into_iter()
        .filter(|(_, total)| *total > 0)
        .map(|(name, total)| {
            let top = per_activity_top.get(&name);
            ActivityAggregate {
                total,
                top_member: top.map(|(member, _)| member.clone()),
                top_value: top.map(|(_, value)| *value),
                name,
            }
        })
        .collect();

    let mut current_standings = false;
    if top_activities.is_empty() && !per_activity_current.is_empty() {
        current_standings = true;
        top_activities = per_activity_current
            .into_iter()
            .filter(|(_, (_, score))| *score > 0)
            .map(|(name, (member, score))| ActivityAggregate {
                name,
                total: score,
                top_member: Some(member),
                top_value: Some(score),
            })
            .collect();
    }
    top_activities.sort_by(|a, b| b.total.cmp(&a.total).then(a.name.cmp(&b.name)));
    top_activities.truncate(TOP_LIMIT);

    Ok(ClanStats {
        clan_id,
        timeframe: timeframe.as_str().to_string(),
        since,
        totals,
        leaderboard,
        top_skills,
        top_activities,
        current_standings,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardMetric {
    Xp,
    Levels,
}

impl LeaderboardMetric {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xp" => Some(LeaderboardMetric::Xp),
            "levels" => Some(LeaderboardMetric::Levels),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardMetric::Xp => "xp",
            LeaderboardMetric::Levels => "levels",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub offset: usize,
    pub metric: String,
    pub timeframe: String,
    pub rows: Vec<LeaderboardRow>,
}

const MAX_PAGE_SIZE: usize = 50;

/// Ranked, paginated leaderboard for a clan. Ranking is a stable sort over
/// membership insertion order, so page boundaries never shuffle on ties.
pub fn clan_leaderboard(
    db: &Database,
    clan_id: i64,
    timeframe: Timeframe,
    metric: LeaderboardMetric,
    page: usize,
    page_size: usize,
    now: DateTime<Utc>,
) -> Result<LeaderboardPage> {
    let members = db.clan_members(clan_id)?;

    let mut rows = Vec::with_capacity(members.len());
    for member in &members {
        let gains = account_window_gains(db, member.id, timeframe, now)?;
        rows.push(LeaderboardRow {
            name: member.name.clone(),
            xp_gain: gains.xp_gain,
            level_gain: gains.level_gain,
        });
    }

    match metric {
        LeaderboardMetric::Xp => rows.sort_by(|a, b| b.xp_gain.cmp(&a.xp_gain)),
        LeaderboardMetric::Levels => rows.sort_by(|a, b| b.level_gain.cmp(&a.level_gain)),
    }

    let total = rows.len();
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * page_size;
    let rows = rows.into_iter().skip(offset).take(page_size).collect();

    Ok(LeaderboardPage {
        total,
        page,
        page_size,
        offset,
        metric: metric.as_str().to_string(),
        timeframe: timeframe.as_str().to_string(),
        rows,
    })
}
