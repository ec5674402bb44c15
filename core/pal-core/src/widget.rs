//! Home-screen widget entries.
//!
//! The host decides when the widget renders; we only supply entries built
//! from the shared store. The widget has no clock of its own, so its sprite
//! frame is derived from the local minute of each entry (even → 1, odd → 2) and changes
//! between entries.

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::SharedStateStore;
use crate::sprites::sprite_name;
use crate::types::{AnimationFrame, AvatarState, Gender};

/// Spacing between timeline entries.
pub const ENTRY_SPACING_MINUTES: i64 = 15;

/// Entries per timeline (one hour).
pub const ENTRIES_PER_TIMELINE: i64 = 4;

/// One renderable widget frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct WidgetEntry {
    /// RFC 3339 instant at which the host should show this entry.
    pub date: String,
    pub state: AvatarState,
    pub gender: Gender,
    pub frame: u32,
    pub sprite_name: String,
    pub caption: String,
}

/// When the host should ask for the next timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    AtEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct WidgetTimeline {
    pub entries: Vec<WidgetEntry>,
    pub policy: ReloadPolicy,
}

/// Entry shown while the widget gallery renders a preview.
pub fn placeholder(now: DateTime<Utc>) -> WidgetEntry {
    entry(now, AvatarState::Low, Gender::Male)
}

/// Single entry from the current stored state.
pub fn snapshot(store: &SharedStateStore, now: DateTime<Utc>) -> WidgetEntry {
    let snapshot = store.snapshot();
    entry(now, snapshot.state, snapshot.render_gender())
}

/// One hour of entries spaced 15 minutes apart, reloaded at the end.
pub fn timeline(store: &SharedStateStore, now: DateTime<Utc>) -> WidgetTimeline {
    let snapshot = store.snapshot();
    let gender = snapshot.render_gender();
    let entries = (0..ENTRIES_PER_TIMELINE)
        .map(|i| {
            let date = now + Duration::minutes(i * ENTRY_SPACING_MINUTES);
            entry(date, snapshot.state, gender)
        })
        .collect();

    WidgetTimeline {
        entries,
        policy: ReloadPolicy::AtEnd,
    }
}

/// Frame for a widget entry shown at `date`, from the minute in `date`'s
/// own zone. Entries use the device's local calendar; its parity differs
/// from UTC in zones with an odd offset minute (e.g. +05:45).
pub fn frame_for<Tz: TimeZone>(date: &DateTime<Tz>) -> AnimationFrame {
    AnimationFrame::clamped(i64::from(date.minute() % 2) + 1)
}

fn entry(date: DateTime<Utc>, state: AvatarState, gender: Gender) -> WidgetEntry {
    let frame = frame_for(&date.with_timezone(&Local));
    WidgetEntry {
        date: date.to_rfc3339(),
        state,
        gender,
        frame: u32::from(frame.get()),
        sprite_name: sprite_name(gender, state, frame),
        caption: state.description().to_string(),
    }
}
