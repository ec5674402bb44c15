//! Live session lifecycle (lock screen / dynamic island surface).
//!
//! # Architecture
//!
//! The host OS owns the session registry. It may keep sessions alive across
//! our process restarts, evict them under budget pressure without telling us,
//! or have the capability disabled altogether. We therefore never trust local
//! "is active" memory alone:
//!
//! ```text
//! step change ─► LiveSessionManager::update ─┐
//! clock tick ──► (marshalled onto owner) ────┼─► SessionHost (create/update/end)
//! start/stop ──► LiveSessionManager ─────────┘        ▲
//!                      │                              │
//!                      └── init / reconcile / stop_all: list_sessions
//! ```
//!
//! # Module Structure
//!
//! - [`manager`]: the Inactive/Active state machine and its clock binding
//! - [`types`]: content payload wire shape, handles, outcomes
//! - [`testing`]: recording host double for tests and simulations

mod manager;
pub mod testing;
mod types;

pub use manager::{ActiveListener, LiveSessionManager};
pub use types::{ContentPayload, Dismissal, HostError, LiveOutcome, SessionHandle};

/// Host session registry.
///
/// Implementors should:
/// - Never block for long; pushes are fire-and-forget from the manager's view
/// - Report failures via `HostError` rather than panicking
/// - List every session belonging to this app, including ones created by a
///   previous process
pub trait SessionHost: Send + Sync {
    /// Whether live sessions are allowed by host policy or user setting.
    fn capability_enabled(&self) -> bool;

    /// All sessions the host currently holds for this app.
    fn list_sessions(&self) -> Vec<SessionHandle>;

    fn request_session(&self, content: &ContentPayload) -> Result<SessionHandle, HostError>;

    fn update_session(
        &self,
        handle: &SessionHandle,
        content: &ContentPayload,
    ) -> Result<(), HostError>;

    fn end_session(&self, handle: &SessionHandle, dismissal: Dismissal) -> Result<(), HostError>;
}
