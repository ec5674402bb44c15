//! Step count → avatar tier classification.

use crate::types::AvatarState;

/// First step count that classifies as [`AvatarState::Neutral`].
pub const NEUTRAL_THRESHOLD: u32 = 2_500;

/// First step count that classifies as [`AvatarState::Vital`].
pub const VITAL_THRESHOLD: u32 = 7_500;

/// Maps a daily step count to its energy tier.
pub fn classify(steps: u32) -> AvatarState {
    if steps >= VITAL_THRESHOLD {
        AvatarState::Vital
    } else if steps >= NEUTRAL_THRESHOLD {
        AvatarState::Neutral
    } else {
        AvatarState::Low
    }
}

/// Classifies a raw health reading, truncating toward zero first.
pub fn classify_reading(steps: f64) -> AvatarState {
    classify(steps_from_reading(steps))
}

/// Converts a floating-point health reading into a whole step count.
///
/// Truncates toward zero. Negative and NaN readings become 0; readings past
/// `u32::MAX` saturate.
pub fn steps_from_reading(steps: f64) -> u32 {
    // `as` saturates and maps NaN to 0.
    steps.trunc().max(0.0) as u32
}
