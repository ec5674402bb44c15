//! Payloads and handles exchanged with the host session registry.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::classifier::steps_from_reading;
use crate::error::PalError;
use crate::sprites::sprite_name;
use crate::types::{AnimationFrame, AvatarState, Gender};

/// Flat, versionless snapshot pushed to the live session.
///
/// Every push is a full snapshot, never a delta, so a dropped push is
/// corrected by the next one.
///
/// Decoding is defensive: unknown or missing `state` becomes `low`, unknown or
/// missing `gender` becomes `male`, missing `steps` becomes 0 and `frame` is
/// clamped into {1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentPayload {
    #[serde(default, deserialize_with = "lenient_steps")]
    pub steps: u32,
    #[serde(default, deserialize_with = "lenient_state")]
    pub state: AvatarState,
    #[serde(default, deserialize_with = "lenient_gender")]
    pub gender: Gender,
    #[serde(default)]
    pub frame: AnimationFrame,
}

impl ContentPayload {
    pub fn new(steps: u32, state: AvatarState, gender: Gender, frame: AnimationFrame) -> Self {
        Self {
            steps,
            state,
            gender,
            frame,
        }
    }

    /// Same content with a different frame.
    pub fn with_frame(self, frame: AnimationFrame) -> Self {
        Self { frame, ..self }
    }

    /// Asset the live session should render for this payload.
    pub fn sprite_name(&self) -> String {
        sprite_name(self.gender, self.state, self.frame)
    }
}

fn lenient_steps<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .or_else(|| n.as_f64().map(steps_from_reading))
            .unwrap_or(0),
        _ => 0,
    })
}

fn lenient_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AvatarState, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(AvatarState::from_token)
        .unwrap_or_default())
}

fn lenient_gender<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Gender, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(Gender::from_token).unwrap_or_default())
}

/// Opaque reference to a session registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: String,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// How the host should remove an ended session from screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dismissal {
    Immediate,
    Deferred,
}

/// Failures reported by a host adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("host unavailable: {0}")]
    Unavailable(String),

    #[error("unknown session {0}")]
    UnknownSession(String),
}

impl HostError {
    /// Wraps a failed update or end call as a push failure.
    pub fn into_push_failure(self, operation: &str) -> PalError {
        PalError::PushFailed {
            operation: operation.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Result of a start or update request.
///
/// These are signals, not errors: every variant leaves the manager in a
/// consistent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveOutcome {
    /// A new session was created and the clock started.
    Started,
    /// The running session's content was replaced.
    Updated,
    /// The host has live sessions disabled; nothing changed.
    CapabilityUnavailable,
    /// The host rejected the session request; the manager is inactive.
    SessionCreateFailed { reason: String },
}

impl LiveOutcome {
    /// True when a session is running as a result of this request.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Started | Self::Updated)
    }

    /// Converts the failure signals into the crate error taxonomy.
    pub fn into_result(self) -> Result<(), PalError> {
        match self {
            Self::Started | Self::Updated => Ok(()),
            Self::CapabilityUnavailable => Err(PalError::CapabilityUnavailable),
            Self::SessionCreateFailed { reason } => Err(PalError::SessionCreateFailed { reason }),
        }
    }
}
