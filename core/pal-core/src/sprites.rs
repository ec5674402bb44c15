//! Sprite asset naming.
//!
//! The app, widget and live session all resolve images through these names,
//! so the format is part of the asset catalog contract:
//!
//! - energy sprites: `{gender}_{state}_{frame}` (e.g. `male_vital_1`)
//! - walking sprites: `{gender}_walking_{frame}` with frame in 1..=8

use crate::types::{AnimationFrame, AvatarState, Gender};

/// Number of frames in the walking cycle.
pub const WALKING_FRAME_COUNT: i64 = 8;

/// Asset name for an energy-state sprite.
pub fn sprite_name(gender: Gender, state: AvatarState, frame: AnimationFrame) -> String {
    sprite_name_raw(gender.token(), state.token(), i64::from(frame.get()))
}

/// Asset name from raw tokens, for extensions that only hold the payload strings.
pub fn sprite_name_raw(gender_raw: &str, state_raw: &str, frame: i64) -> String {
    format!("{}_{}_{}", gender_raw, state_raw, frame)
}

/// Asset name for a walking-cycle sprite. Out-of-range frames are clamped.
pub fn walking_sprite_name(gender: Gender, frame: i64) -> String {
    walking_sprite_name_raw(gender.token(), frame)
}

pub fn walking_sprite_name_raw(gender_raw: &str, frame: i64) -> String {
    let frame = frame.clamp(1, WALKING_FRAME_COUNT);
    format!("{}_walking_{}", gender_raw, frame)
}

/// Every asset name the catalog is expected to contain.
pub fn all_asset_names() -> Vec<String> {
    let mut names = Vec::new();
    for gender in Gender::ALL {
        for state in [AvatarState::Vital, AvatarState::Neutral, AvatarState::Low] {
            for frame in [AnimationFrame::FIRST, AnimationFrame::SECOND] {
                names.push(sprite_name(gender, state, frame));
            }
        }
        for frame in 1..=WALKING_FRAME_COUNT {
            names.push(walking_sprite_name(gender, frame));
        }
    }
    names
}
