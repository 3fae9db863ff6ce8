//! Hiscore payload types
//!
//! The upstream JSON endpoint normally returns `skills` and `activities` as
//! arrays, but archived payloads sometimes carry them as objects keyed by id
//! or name. Both shapes are canonicalized into ordered record sequences at
//! deserialization time so nothing downstream has to care.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiscorePayload {
    #[serde(default, deserialize_with = "entry_seq")]
    pub skills: Vec<SkillEntry>,
    #[serde(default, deserialize_with = "entry_seq")]
    pub activities: Vec<ActivityEntry>,
}

/// One skill row. Negative values are upstream sentinels for "unranked" and
/// survive until normalization replaces them with `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub xp: Option<i64>,
}

/// One activity row (minigame, boss, or points track).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub score: Option<i64>,
}

impl HiscorePayload {
    /// The "Overall" skill row, if the payload carries one. Falls back to the
    /// first row, which is where the upstream tables place the overall line.
    pub fn overall(&self) -> Option<&SkillEntry> {
        self.skills
            .iter()
            .find(|skill| {
                skill
                    .name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case("overall"))
            })
            .or_else(|| self.skills.first())
    }
}

fn entry_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape<T> {
        List(Vec<T>),
        Keyed(BTreeMap<String, T>),
    }

    Ok(match Shape::deserialize(deserializer)? {
        Shape::List(entries) => entries,
        Shape::Keyed(map) => map.into_values().collect(),
    })
}
