//! Gamemode definitions and probe-order constants

use serde::{Deserialize, Serialize};

/// A hiscore table variant. Each account appears in one or more of these
/// depending on its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Main,
    Ironman,
    Hardcore,
    Ultimate,
    GroupIronman,
    HardcoreGroupIronman,
    Deadman,
    Tournament,
    Seasonal,
}

/// Iron-family probe priority. Hardcore variants come first so that a live
/// hardcore account is preferred over its ironman shadow entry.
pub const IRON_FAMILY: [GameMode; 5] = [
    GameMode::Hardcore,
    GameMode::HardcoreGroupIronman,
    GameMode::Ironman,
    GameMode::GroupIronman,
    GameMode::Ultimate,
];

/// Probed after the iron family when auto-detecting.
pub const FALLBACK_MODES: [GameMode; 4] = [
    GameMode::Main,
    GameMode::Tournament,
    GameMode::Seasonal,
    GameMode::Deadman,
];

/// Modes that cannot transition into another category. A cache hit on one of
/// these is trusted without re-probing.
pub const STABLE_CACHED_MODES: [GameMode; 4] = [
    GameMode::Ironman,
    GameMode::GroupIronman,
    GameMode::Ultimate,
    GameMode::Main,
];

pub const DEFAULT_MODE: GameMode = GameMode::Main;

impl GameMode {
    pub const ALL: [GameMode; 9] = [
        GameMode::Main,
        GameMode::Ironman,
        GameMode::Hardcore,
        GameMode::Ultimate,
        GameMode::GroupIronman,
        GameMode::HardcoreGroupIronman,
        GameMode::Deadman,
        GameMode::Tournament,
        GameMode::Seasonal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Main => "main",
            GameMode::Ironman => "ironman",
            GameMode::Hardcore => "hardcore",
            GameMode::Ultimate => "ultimate",
            GameMode::GroupIronman => "group_ironman",
            GameMode::HardcoreGroupIronman => "hardcore_group_ironman",
            GameMode::Deadman => "deadman",
            GameMode::Tournament => "tournament",
            GameMode::Seasonal => "seasonal",
        }
    }

    /// Parse from query string parameter or database column.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Some(GameMode::Main),
            "ironman" => Some(GameMode::Ironman),
            "hardcore" => Some(GameMode::Hardcore),
            "ultimate" => Some(GameMode::Ultimate),
            "group_ironman" => Some(GameMode::GroupIronman),
            "hardcore_group_ironman" => Some(GameMode::HardcoreGroupIronman),
            "deadman" => Some(GameMode::Deadman),
            "tournament" => Some(GameMode::Tournament),
            "seasonal" => Some(GameMode::Seasonal),
            _ => None,
        }
    }

    /// Path segment for the hiscore endpoint of this mode.
    pub fn hiscore_path(&self) -> &'static str {
        match self {
            GameMode::Main => "hiscore_oldschool",
            GameMode::Ironman => "hiscore_ironman",
            GameMode::Hardcore => "hiscore_hardcore_ironman",
            GameMode::Ultimate => "hiscore_ultimate",
            GameMode::GroupIronman => "hiscore_group_ironman",
            GameMode::HardcoreGroupIronman => "hiscore_hardcore_group_ironman",
            GameMode::Deadman => "hiscore_deadman",
            GameMode::Tournament => "hiscore_tournament",
            GameMode::Seasonal => "hiscore_seasonal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GameMode::Main => "Regular",
            GameMode::Ironman => "Ironman",
            GameMode::Hardcore => "Hardcore Ironman",
            GameMode::Ultimate => "Ultimate Ironman",
            GameMode::GroupIronman => "Group Ironman",
            GameMode::HardcoreGroupIronman => "Hardcore Group Ironman",
            GameMode::Deadman => "Deadman Mode",
            GameMode::Tournament => "Tournament",
            GameMode::Seasonal => "Leagues",
        }
    }

    pub fn is_stable_cached(&self) -> bool {
        STABLE_CACHED_MODES.contains(self)
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller asked for: a concrete mode, or auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedMode {
    Auto,
    Mode(GameMode),
}

impl RequestedMode {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" | "auto-detect" => Some(RequestedMode::Auto),
            other => GameMode::parse_str(other).map(RequestedMode::Mode),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestedMode::Auto => "auto",
            RequestedMode::Mode(mode) => mode.as_str(),
        }
    }
}

impl std::fmt::Display for RequestedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RequestedMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RequestedMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RequestedMode::parse_str(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown mode: {raw}")))
    }
}

/// Canonical skill ordering as exposed by the hiscore tables, "Overall" first.
pub const SKILLS: [&str; 24] = [
    "Overall",
    "Attack",
    "Defence",
    "Strength",
    "Hitpoints",
    "Ranged",
    "Prayer",
    "Magic",
    "Cooking",
    "Woodcutting",
    "Fletching",
    "Fishing",
    "Firemaking",
    "Crafting",
    "Smithing",
    "Mining",
    "Herblore",
    "Agility",
    "Thieving",
    "Slayer",
    "Farming",
    "Runecraft",
    "Hunter",
    "Construction",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in GameMode::ALL {
            assert_eq!(GameMode::parse_str(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn test_requested_mode_parsing() {
        assert_eq!(RequestedMode::parse_str("auto"), Some(RequestedMode::Auto));
        assert_eq!(
            RequestedMode::parse_str("Auto-Detect"),
            Some(RequestedMode::Auto)
        );
        assert_eq!(
            RequestedMode::parse_str(" hardcore "),
            Some(RequestedMode::Mode(GameMode::Hardcore))
        );
        assert_eq!(RequestedMode::parse_str("bronzeman"), None);
    }

    #[test]
    fn test_iron_family_priority_order() {
        assert_eq!(
            IRON_FAMILY,
            [
                GameMode::Hardcore,
                GameMode::HardcoreGroupIronman,
                GameMode::Ironman,
                GameMode::GroupIronman,
                GameMode::Ultimate,
            ]
        );
    }

    #[test]
    fn test_stable_modes_never_include_hardcore() {
        assert!(!GameMode::Hardcore.is_stable_cached());
        assert!(!GameMode::HardcoreGroupIronman.is_stable_cached());
        assert!(GameMode::Main.is_stable_cached());
    }
}
