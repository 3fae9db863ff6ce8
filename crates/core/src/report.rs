//! Markdown report generation for snapshots

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::snapshot::{totals_from_skills, Delta, SnapshotFile};

/// Render one snapshot (and its delta, when present) as a Markdown report.
pub fn build_report(snapshot: &SnapshotFile) -> String {
    let metadata = &snapshot.metadata;
    let (total_level, total_xp) = totals_from_skills(&snapshot.data.skills);

    let mut lines = vec![
        format!("# OSRS Snapshot Report — {}", metadata.player),
        String::new(),
        format!("- **Player:** {}", metadata.player),
        format!("- **Mode:** {}", metadata.resolved_mode),
        format!("- **Fetched:** {}", format_timestamp(metadata.fetched_at)),
        format!("- **Total XP:** {}", group_thousands(total_xp)),
        format!("- **Total Level:** {total_level}"),
    ];

    if let Some(delta) = &snapshot.delta {
        lines.push(format!("- **Changes:** {}", summarize_markdown(delta)));
    }

    lines.push(String::new());
    lines.push("## Skills".to_string());
    lines.push(String::new());
    lines.push("| Skill | Level | XP |".to_string());
    lines.push("| ----- | ----- | -- |".to_string());
    for skill in &snapshot.data.skills {
        if let Some(name) = skill.name.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!(
                "| {} | {} | {} |",
                name,
                skill.level.unwrap_or(0),
                group_thousands(skill.xp.unwrap_or(0)),
            ));
        }
    }

    let notable: Vec<_> = snapshot
        .data
        .activities
        .iter()
        .filter(|activity| activity.score.unwrap_or(0) > 0)
        .collect();
    if !notable.is_empty() {
        lines.push(String::new());
        lines.push("## Activities (Notable)".to_string());
        lines.push(String::new());
        lines.push("| Activity | Score |".to_string());
        lines.push("| -------- | ----- |".to_string());
        for activity in notable {
            lines.push(format!(
                "| {} | {} |",
                activity.name.as_deref().unwrap_or("-"),
                group_thousands(activity.score.unwrap_or(0)),
            ));
        }
    }

    lines.push(String::new());
    lines.push("## Source".to_string());
    lines.push(String::new());
    lines.push("```json".to_string());
    lines.push(truncated_json(snapshot, 2048));
    lines.push("```".to_string());

    lines.join("\n")
}

/// Verbose delta dialect used inside reports: comma-grouped XP totals and
/// spaced `Name (+n)` fragments.
pub fn summarize_markdown(delta: &Delta) -> String {
    let mut fragments = Vec::new();

    if delta.total_xp_delta != 0 {
        fragments.push(format!("ΔXP {}", group_thousands(delta.total_xp_delta)));
    }

    let leveled: Vec<_> = delta
        .skill_deltas
        .iter()
        .filter(|skill| skill.level_delta > 0)
        .collect();
    if !leveled.is_empty() {
        let parts: Vec<String> = leveled
            .iter()
            .take(3)
            .map(|skill| format!("{} (+{})", skill.name, skill.level_delta))
            .collect();
        fragments.push(format!("Levels {}", parts.join(", ")));
    } else {
        let gained: Vec<_> = delta
            .skill_deltas
            .iter()
            .filter(|skill| skill.xp_delta > 0)
            .collect();
        if !gained.is_empty() {
            let parts: Vec<String> = gained
                .iter()
                .take(3)
                .map(|skill| format!("{} (+{})", skill.name, group_thousands(skill.xp_delta)))
                .collect();
            fragments.push(format!("XP {}", parts.join(", ")));
        }
    }

    if fragments.is_empty() {
        return "No changes recorded.".to_string();
    }
    fragments.join(" | ")
}

pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Thousands separator, e.g. 1234567 -> "1,234,567".
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn truncated_json(snapshot: &SnapshotFile, limit: usize) -> String {
    let raw = serde_json::to_string_pretty(snapshot).unwrap_or_default();
    if raw.len() <= limit {
        return raw;
    }
    let mut end = limit.saturating_sub(3);
    while end > 0 && !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}
