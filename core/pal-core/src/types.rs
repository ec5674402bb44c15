//! Core types shared across every Pixel Pal surface.
//!
//! The app, the home-screen widget and the live session extension all render
//! from these exact types, so tokens and defaults must stay stable.
//!
//! **FFI Support:** Types are annotated with UniFFI macros for Swift/Kotlin bindings.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// Avatar State
// ═══════════════════════════════════════════════════════════════════════════════

/// Energy tier of the companion, ordered from least to most energetic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, uniffi::Enum,
)]
#[serde(rename_all = "lowercase")]
pub enum AvatarState {
    Low,
    Neutral,
    Vital,
}

impl AvatarState {
    pub const ALL: [AvatarState; 3] = [AvatarState::Low, AvatarState::Neutral, AvatarState::Vital];

    /// Stable lowercase token used in storage, payloads and sprite names.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Neutral => "neutral",
            Self::Vital => "vital",
        }
    }

    /// Parses a stored token. Returns `None` for anything unrecognised.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "low" => Some(Self::Low),
            "neutral" => Some(Self::Neutral),
            "vital" => Some(Self::Vital),
            _ => None,
        }
    }

    /// Human-readable caption shown under the sprite.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low Energy",
            Self::Neutral => "Neutral",
            Self::Vital => "Vital",
        }
    }
}

impl Default for AvatarState {
    /// New users start at the least energetic tier.
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for AvatarState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Gender
// ═══════════════════════════════════════════════════════════════════════════════

/// Character selection made once during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn token(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl Default for Gender {
    /// Primary character, used wherever no selection has been stored yet.
    fn default() -> Self {
        Self::Male
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(&s.to_ascii_lowercase())
            .ok_or_else(|| format!("Unknown gender '{}': expected male or female", s))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Animation Frame
// ═══════════════════════════════════════════════════════════════════════════════

/// Two-valued sprite frame index (1 or 2). Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct AnimationFrame(u8);

impl AnimationFrame {
    pub const FIRST: AnimationFrame = AnimationFrame(1);
    pub const SECOND: AnimationFrame = AnimationFrame(2);

    /// Clamps any integer into {1, 2}.
    pub fn clamped(value: i64) -> Self {
        if value >= 2 {
            Self::SECOND
        } else {
            Self::FIRST
        }
    }

    pub fn toggled(self) -> Self {
        if self == Self::FIRST {
            Self::SECOND
        } else {
            Self::FIRST
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for AnimationFrame {
    fn default() -> Self {
        Self::FIRST
    }
}

impl From<i64> for AnimationFrame {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<AnimationFrame> for u8 {
    fn from(frame: AnimationFrame) -> u8 {
        frame.0
    }
}

impl std::fmt::Display for AnimationFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshots
// ═══════════════════════════════════════════════════════════════════════════════

/// One consistent read of the shared storage region.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Record)]
pub struct AvatarSnapshot {
    pub state: AvatarState,
    pub steps: u32,
    pub gender: Option<Gender>,
    /// RFC 3339 timestamp of the last state write, if any.
    pub last_update: Option<String>,
}

impl AvatarSnapshot {
    /// Gender to render with, falling back to the primary character.
    pub fn render_gender(&self) -> Gender {
        self.gender.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tokens_are_lowercase() {
        assert_eq!(AvatarState::Low.token(), "low");
        assert_eq!(AvatarState::Neutral.token(), "neutral");
        assert_eq!(AvatarState::Vital.token(), "vital");
    }

    #[test]
    fn test_state_descriptions() {
        assert_eq!(AvatarState::Low.description(), "Low Energy");
        assert_eq!(AvatarState::Neutral.description(), "Neutral");
        assert_eq!(AvatarState::Vital.description(), "Vital");
    }

    #[test]
    fn test_states_are_ordered_by_energy() {
        assert!(AvatarState::Low < AvatarState::Neutral);
        assert!(AvatarState::Neutral < AvatarState::Vital);
    }

    #[test]
    fn test_state_serializes_to_token() {
        for state in AvatarState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.token()));
        }
    }

    #[test]
    fn test_unknown_state_token_is_none() {
        assert_eq!(AvatarState::from_token("ecstatic"), None);
        assert_eq!(AvatarState::from_token("LOW"), None);
    }

    #[test]
    fn test_gender_display_names() {
        assert_eq!(Gender::Male.display_name(), "Male");
        assert_eq!(Gender::Female.display_name(), "Female");
    }

    #[test]
    fn test_gender_from_str_is_case_insensitive() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("robot".parse::<Gender>().is_err());
    }

    #[test]
    fn test_frame_toggles_between_one_and_two() {
        let frame = AnimationFrame::FIRST;
        assert_eq!(frame.toggled(), AnimationFrame::SECOND);
        assert_eq!(frame.toggled().toggled(), AnimationFrame::FIRST);
    }

    #[test]
    fn test_frame_decode_clamps() {
        let frame: AnimationFrame = serde_json::from_str("7").unwrap();
        assert_eq!(frame, AnimationFrame::SECOND);
        let frame: AnimationFrame = serde_json::from_str("-3").unwrap();
        assert_eq!(frame, AnimationFrame::FIRST);
        assert_eq!(serde_json::to_string(&AnimationFrame::SECOND).unwrap(), "2");
    }

    #[test]
    fn test_snapshot_render_gender_defaults_to_male() {
        let snapshot = AvatarSnapshot::default();
        assert_eq!(snapshot.render_gender(), Gender::Male);
        assert_eq!(snapshot.state, AvatarState::Low);
    }
}
