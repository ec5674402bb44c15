//! PalEngine - the main entry point for Pixel Pal clients.
//!
//! The engine is the in-app state-update path: it is the only writer of the
//! state/steps pair and, through `select_gender`, of the onboarding choice.
//! The widget and live session extensions construct their own engine over
//! the same group container and only read.
//!
//! [`LiveSync`] composes the engine with a [`LiveSessionManager`] so a step
//! change reaches all three surfaces:
//!
//! ```text
//! record_steps → classify → store.write ─► widget (reload signal)
//!                               └─────────► live session (update, if active)
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::classifier::{classify, steps_from_reading};
use crate::clock::AnimationClock;
use crate::error::PalFfiError;
use crate::live::{LiveOutcome, LiveSessionManager, SessionHost};
use crate::shared::SharedStateStore;
use crate::sprites;
use crate::storage::StorageConfig;
use crate::types::{AnimationFrame, AvatarSnapshot, AvatarState, Gender};
use crate::widget::{self, WidgetEntry, WidgetTimeline};

/// The main engine for Pixel Pal state.
///
/// This is the primary FFI interface for Swift/Kotlin clients.
#[derive(uniffi::Object)]
pub struct PalEngine {
    store: SharedStateStore,
}

impl PalEngine {
    /// Creates an engine over a custom storage location.
    /// Not exposed to FFI - use `new()` for external clients.
    pub fn with_storage(storage: &StorageConfig) -> Self {
        Self::with_store(SharedStateStore::open(storage))
    }

    pub fn with_store(store: SharedStateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedStateStore {
        &self.store
    }
}

#[uniffi::export]
impl PalEngine {
    /// Creates an engine over the default group container (`~/.pixelpal`).
    ///
    /// Without a home directory the engine runs with unavailable storage:
    /// every read returns defaults.
    #[uniffi::constructor]
    pub fn new() -> Self {
        match StorageConfig::from_home() {
            Some(storage) => Self::with_storage(&storage),
            None => {
                warn!("Home directory not found; shared storage unavailable");
                Self::with_store(SharedStateStore::unavailable("home directory not found"))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // State API
    // ─────────────────────────────────────────────────────────────────────────────

    /// Classifies and persists a step count, returning what surfaces should show.
    ///
    /// A failed write is logged and dropped; the returned snapshot still
    /// reflects the new tier so the in-app view stays current.
    pub fn record_steps(&self, steps: u32) -> AvatarSnapshot {
        let state = classify(steps);
        match self.store.write(state, steps) {
            Ok(()) => self.store.snapshot(),
            Err(err) => {
                warn!(error = %err, steps, "Failed to persist avatar state");
                AvatarSnapshot {
                    state,
                    steps,
                    gender: self.store.read_gender(),
                    last_update: Some(Utc::now().to_rfc3339()),
                }
            }
        }
    }

    /// Same as `record_steps` for a raw floating-point health reading.
    pub fn record_reading(&self, steps: f64) -> AvatarSnapshot {
        self.record_steps(steps_from_reading(steps))
    }

    /// Stores the onboarding character selection.
    pub fn select_gender(&self, gender: Gender) -> Result<(), PalFfiError> {
        self.store.write_gender(gender).map_err(PalFfiError::from)
    }

    pub fn snapshot(&self) -> AvatarSnapshot {
        self.store.snapshot()
    }

    pub fn has_selected_gender(&self) -> bool {
        self.store.has_selected_gender()
    }

    pub fn classify(&self, steps: u32) -> AvatarState {
        classify(steps)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Sprites API
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn sprite_name(&self, gender: Gender, state: AvatarState, frame: u32) -> String {
        sprites::sprite_name(gender, state, AnimationFrame::clamped(i64::from(frame)))
    }

    pub fn walking_sprite_name(&self, gender: Gender, frame: i64) -> String {
        sprites::walking_sprite_name(gender, frame)
    }

    pub fn all_asset_names(&self) -> Vec<String> {
        sprites::all_asset_names()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Widget API
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn widget_placeholder(&self) -> WidgetEntry {
        widget::placeholder(Utc::now())
    }

    pub fn widget_snapshot(&self) -> WidgetEntry {
        widget::snapshot(&self.store, Utc::now())
    }

    pub fn widget_timeline(&self) -> WidgetTimeline {
        widget::timeline(&self.store, Utc::now())
    }
}

/// Engine plus live session manager: the app-side control flow.
pub struct LiveSync {
    engine: PalEngine,
    manager: LiveSessionManager,
}

impl LiveSync {
    /// Builds the manager over the engine's store, adopting any session the
    /// host already holds.
    pub fn new(
        engine: PalEngine,
        host: Arc<dyn SessionHost>,
        clock: Box<dyn AnimationClock>,
    ) -> Self {
        let manager = LiveSessionManager::new(host, clock, engine.store());
        Self { engine, manager }
    }

    pub fn engine(&self) -> &PalEngine {
        &self.engine
    }

    pub fn manager(&self) -> &LiveSessionManager {
        &self.manager
    }

    /// Records a step change and pushes it to the live session if one is running.
    pub fn record_steps(&self, steps: u32) -> AvatarSnapshot {
        let snapshot = self.engine.record_steps(steps);
        if self.manager.is_active() {
            self.manager
                .update(snapshot.steps, snapshot.state, snapshot.render_gender());
        }
        snapshot
    }

    /// Starts a live session showing the stored state.
    pub fn start_session(&self) -> LiveOutcome {
        let snapshot = self.engine.snapshot();
        self.manager
            .start(snapshot.steps, snapshot.state, snapshot.render_gender())
    }

    pub fn stop_session(&self) {
        self.manager.stop();
    }
}
