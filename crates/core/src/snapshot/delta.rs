//! Snapshot delta computation and summaries

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hiscore::{ActivityEntry, HiscorePayload, SkillEntry};

/// Progress between two snapshots. Pure function of the two payloads; only
/// positive per-entry gains are retained, while `total_xp_delta` spans the
/// full skill sets and may be negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub total_xp_delta: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_diff_hours: Option<f64>,
    pub skill_deltas: Vec<SkillDelta>,
    pub activity_deltas: Vec<ActivityDelta>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.total_xp_delta == 0 && self.skill_deltas.is_empty() && self.activity_deltas.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDelta {
    pub name: String,
    pub xp_delta: i64,
    pub level_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDelta {
    pub name: String,
    pub score_delta: i64,
}

/// Compute deltas between two normalized snapshot payloads.
///
/// Entries are joined by name; nameless rows are dropped and missing numeric
/// fields count as zero. Skill deltas keep entries with any positive XP or
/// level gain, activity deltas keep positive score gains, both sorted
/// descending by gain.
pub fn compute_delta(previous: &HiscorePayload, current: &HiscorePayload) -> Delta {
    let prev_skills = index_skills(&previous.skills);
    let prev_activities = index_activities(&previous.activities);

    let mut skill_deltas = Vec::new();
    for skill in &current.skills {
        let Some(name) = entry_name(skill.name.as_deref()) else {
            continue;
        };
        let prev = prev_skills.get(name).copied();
        let xp_delta = number_delta(prev.and_then(|s| s.xp), skill.xp);
        let level_delta = number_delta(prev.and_then(|s| s.level), skill.level);
        if xp_delta > 0 || level_delta > 0 {
            skill_deltas.push(SkillDelta {
                name: name.to_string(),
                xp_delta,
                level_delta,
            });
        }
    }
    skill_deltas.sort_by(|a, b| b.xp_delta.cmp(&a.xp_delta));

    let mut activity_deltas = Vec::new();
    for activity in &current.activities {
        let Some(name) = entry_name(activity.name.as_deref()) else {
            continue;
        };
        let prev = prev_activities.get(name).copied();
        let score_delta = number_delta(prev.and_then(|a| a.score), activity.score);
        if score_delta > 0 {
            activity_deltas.push(ActivityDelta {
                name: name.to_string(),
                score_delta,
            });
        }
    }
    activity_deltas.sort_by(|a, b| b.score_delta.cmp(&a.score_delta));

    let total_xp_prev: i64 = previous.skills.iter().map(|s| s.xp.unwrap_or(0)).sum();
    let total_xp_curr: i64 = current.skills.iter().map(|s| s.xp.unwrap_or(0)).sum();

    Delta {
        total_xp_delta: total_xp_curr - total_xp_prev,
        time_diff_hours: None,
        skill_deltas,
        activity_deltas,
    }
}

fn index_skills(entries: &[SkillEntry]) -> HashMap<&str, &SkillEntry> {
    entries
        .iter()
        .filter_map(|entry| entry_name(entry.name.as_deref()).map(|name| (name, entry)))
        .collect()
}

fn index_activities(entries: &[ActivityEntry]) -> HashMap<&str, &ActivityEntry> {
    entries
        .iter()
        .filter_map(|entry| entry_name(entry.name.as_deref()).map(|name| (name, entry)))
        .collect()
}

fn entry_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.is_empty())
}

fn number_delta(old: Option<i64>, new: Option<i64>) -> i64 {
    new.unwrap_or(0) - old.unwrap_or(0)
}

/// One-line summary of a delta, terse dialect: symbol-prefixed fragments
/// joined with " | ", suitable for log lines and clipboard export.
pub fn summarize(delta: &Delta) -> String {
    let mut fragments = Vec::new();

    if delta.total_xp_delta != 0 {
        fragments.push(format!("ΔXP {}", format_number(delta.total_xp_delta)));
    }

    let leveled: Vec<&SkillDelta> = delta
        .skill_deltas
        .iter()
        .filter(|skill| skill.level_delta > 0)
        .collect();

    if !leveled.is_empty() {
        let parts: Vec<String> = leveled
            .iter()
            .take(3)
            .map(|skill| format!("{}(+{})", skill.name, skill.level_delta))
            .collect();
        fragments.push(format!("Levels: {}", parts.join(", ")));
    } else if !delta.skill_deltas.is_empty() {
        let parts: Vec<String> = delta
            .skill_deltas
            .iter()
            .take(3)
            .map(|skill| format!("{}({})", skill.name, format_number(skill.xp_delta)))
            .collect();
        fragments.push(format!("XP gains: {}", parts.join(", ")));
    }

    if !delta.activity_deltas.is_empty() {
        let parts: Vec<String> = delta
            .activity_deltas
            .iter()
            .take(3)
            .map(|activity| format!("{}(+{})", activity.name, activity.score_delta))
            .collect();
        fragments.push(format!("Activities: {}", parts.join(", ")));
    }

    if fragments.is_empty() {
        return "No changes since last snapshot.".to_string();
    }

    fragments.join(" | ")
}

/// Compact K/M/B rendering with two decimals; values under a thousand print
/// as-is. A "-0.00" artifact from rounding tiny negatives collapses to "0".
pub fn format_number(value: i64) -> String {
    let abs = value.abs();
    let formatted = if abs >= 1_000_000_000 {
        format!("{:.2}B", value as f64 / 1_000_000_000.0)
    } else if abs >= 1_000_000 {
        format!("{:.2}M", value as f64 / 1_000_000.0)
    } else if abs >= 1_000 {
        format!("{:.2}K", value as f64 / 1_000.0)
    } else {
        value.to_string()
    };

    if formatted.starts_with("-0.00") {
        return "0".to_string();
    }
    formatted
}
