//! Error types for pal-core operations.
//! Keep PalFfiError minimal and stable to avoid breaking FFI clients.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// FFI-Compatible Error (for Swift/Kotlin)
// ═══════════════════════════════════════════════════════════════════════════════

/// FFI-safe error type for use across language boundaries.
///
/// Carries only a message string so UniFFI can lower it without
/// exposing the internal error taxonomy.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PalFfiError {
    #[error("{message}")]
    General { message: String },
}

impl From<String> for PalFfiError {
    fn from(message: String) -> Self {
        PalFfiError::General { message }
    }
}

impl From<&str> for PalFfiError {
    fn from(message: &str) -> Self {
        PalFfiError::General {
            message: message.to_string(),
        }
    }
}

impl From<PalError> for PalFfiError {
    fn from(err: PalError) -> Self {
        PalFfiError::General {
            message: err.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Internal Error (for Rust-only use)
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in pal-core operations.
///
/// None of these are fatal to the process. Live-session errors degrade to
/// "no live session", storage errors degrade to "stale display".
#[derive(Debug, thiserror::Error)]
pub enum PalError {
    // ─────────────────────────────────────────────────────────────────────
    // Live Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Live sessions are disabled by the host")]
    CapabilityUnavailable,

    #[error("Host rejected live session request: {reason}")]
    SessionCreateFailed { reason: String },

    #[error("Live session {operation} failed: {reason}")]
    PushFailed { operation: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Shared storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using PalError.
pub type Result<T> = std::result::Result<T, PalError>;
