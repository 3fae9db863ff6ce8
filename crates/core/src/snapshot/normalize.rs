//! Raw payload sanitization

use crate::hiscore::HiscorePayload;

/// Return a sanitized copy of the payload.
///
/// The hiscore endpoints use negative numbers as "unranked"/"not applicable"
/// sentinels; every such value becomes `None`. The input is left untouched
/// and malformed entries pass through as-is.
pub fn normalize(payload: &HiscorePayload) -> HiscorePayload {
    let mut data = payload.clone();

    for skill in &mut data.skills {
        skill.rank = scrub(skill.rank);
        skill.level = scrub(skill.level);
        skill.xp = scrub(skill.xp);
    }

    for activity in &mut data.activities {
        activity.rank = scrub(activity.rank);
        activity.score = scrub(activity.score);
    }

    data
}

fn scrub(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_sentinels_become_none() {
        let raw: HiscorePayload = serde_json::from_str(
            r#"{
                "skills": [
                    {"name": "Attack", "rank": -1, "level": 50, "xp": 12345},
                    {"name": "Magic", "rank": 1000, "level": -1, "xp": -1}
                ],
                "activities": [
                    {"name": "Tempoross", "rank": -1, "score": -1},
                    {"name": "Rifts Closed", "rank": 100, "score": 10}
                ]
            }"#,
        )
        .unwrap();

        let normalized = normalize(&raw);

        assert_eq!(normalized.skills[0].rank, None);
        assert_eq!(normalized.skills[0].level, Some(50));
        assert_eq!(normalized.skills[0].xp, Some(12345));
        assert_eq!(normalized.skills[1].level, None);
        assert_eq!(normalized.skills[1].xp, None);
        assert_eq!(normalized.activities[0].rank, None);
        assert_eq!(normalized.activities[0].score, None);
        assert_eq!(normalized.activities[1].score, Some(10));

        // the input must not be mutated
        assert_eq!(raw.skills[0].rank, Some(-1));
    }

    #[test]
    fn test_rank_never_negative_after_normalize() {
        let raw: HiscorePayload = serde_json::from_str(
            r#"{"skills": [{"name": "Slayer", "rank": -2147483648, "level": 1, "xp": 0}]}"#,
        )
        .unwrap();

        let normalized = normalize(&raw);
        for skill in &normalized.skills {
            assert!(skill.rank.is_none_or(|rank| rank >= 0));
        }
    }
}
