//! # pal-core
//!
//! Core library for Pixel Pal, shared by every surface that renders the
//! companion: the app, the home-screen widget and the live session
//! (lock screen / dynamic island).
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Host calls are issued from
//!   the owning context and treated as fire-and-forget.
//! - **Graceful degradation**: Missing or corrupt storage returns defaults;
//!   host failures degrade to "no live session", never a crash.
//! - **Single source of truth**: The shared store holds the current state;
//!   every surface reads it, only the engine writes it.
//! - **FFI-ready**: UniFFI annotations enable Swift and Kotlin bindings.
//!   Prefer additive public API changes; removing or renaming breaks FFI clients.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pal_core::PalEngine;
//!
//! let engine = PalEngine::new();
//! let snapshot = engine.record_steps(4_200);
//! let timeline = engine.widget_timeline();
//! ```

// UniFFI scaffolding for Swift/Kotlin bindings
uniffi::setup_scaffolding!();

pub mod classifier;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod live;
pub mod shared;
pub mod sprites;
pub mod storage;
pub mod types;
pub mod widget;

// Re-export commonly used items at crate root
pub use classifier::{classify, classify_reading, NEUTRAL_THRESHOLD, VITAL_THRESHOLD};
pub use clock::{AnimationClock, ManualClock, ThreadClock, FRAME_INTERVAL};
pub use config::{load_config, PalConfig};
pub use engine::{LiveSync, PalEngine};
pub use error::{PalError, PalFfiError, Result};
pub use live::{
    ContentPayload, Dismissal, HostError, LiveOutcome, LiveSessionManager, SessionHandle,
    SessionHost,
};
pub use shared::{NoopReloader, SharedStateStore, SurfaceReloader};
pub use storage::{RegionLock, StorageConfig};
pub use types::*;
pub use widget::{WidgetEntry, WidgetTimeline};
