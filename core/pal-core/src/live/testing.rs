//! In-memory host double that records every call.
//!
//! Used by unit and integration tests, and handy for simulations that need a
//! host without an OS behind it.

use std::sync::{Mutex, MutexGuard};

use super::types::{ContentPayload, Dismissal, HostError, SessionHandle};
use super::SessionHost;

/// One call made against the host, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CapabilityCheck,
    List,
    Request(ContentPayload),
    Update(SessionHandle, ContentPayload),
    End(SessionHandle, Dismissal),
}

struct RecordingState {
    enabled: bool,
    fail_requests: bool,
    fail_updates: bool,
    sessions: Vec<SessionHandle>,
    next_id: u64,
    calls: Vec<HostCall>,
    delivered: Vec<ContentPayload>,
}

/// Host double with toggleable capability and failure injection.
///
/// Session ids are `session-1`, `session-2`, ... in creation order.
pub struct RecordingHost {
    state: Mutex<RecordingState>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecordingState {
                enabled: true,
                fail_requests: false,
                fail_updates: false,
                sessions: Vec::new(),
                next_id: 1,
                calls: Vec::new(),
                delivered: Vec::new(),
            }),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn set_fail_requests(&self, fail: bool) {
        self.lock().fail_requests = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.lock().fail_updates = fail;
    }

    /// Registers a session as if a previous process had created it.
    pub fn seed_session(&self) -> SessionHandle {
        let mut state = self.lock();
        let handle = next_handle(&mut state);
        state.sessions.push(handle.clone());
        handle
    }

    /// Removes a session without telling anyone, like a host budget eviction.
    pub fn evict(&self, handle: &SessionHandle) {
        self.lock().sessions.retain(|h| h != handle);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Contents the host accepted, from requests and updates, in order.
    pub fn pushes(&self) -> Vec<ContentPayload> {
        self.lock().delivered.clone()
    }

    pub fn end_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, HostCall::End(..)))
            .count()
    }

    pub fn live_sessions(&self) -> Vec<SessionHandle> {
        self.lock().sessions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn next_handle(state: &mut RecordingState) -> SessionHandle {
    let handle = SessionHandle::new(format!("session-{}", state.next_id));
    state.next_id += 1;
    handle
}

impl SessionHost for RecordingHost {
    fn capability_enabled(&self) -> bool {
        let mut state = self.lock();
        state.calls.push(HostCall::CapabilityCheck);
        state.enabled
    }

    fn list_sessions(&self) -> Vec<SessionHandle> {
        let mut state = self.lock();
        state.calls.push(HostCall::List);
        state.sessions.clone()
    }

    fn request_session(&self, content: &ContentPayload) -> Result<SessionHandle, HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Request(*content));
        if state.fail_requests {
            return Err(HostError::Rejected("too many live sessions".to_string()));
        }
        let handle = next_handle(&mut state);
        state.sessions.push(handle.clone());
        state.delivered.push(*content);
        Ok(handle)
    }

    fn update_session(
        &self,
        handle: &SessionHandle,
        content: &ContentPayload,
    ) -> Result<(), HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Update(handle.clone(), *content));
        if state.fail_updates {
            return Err(HostError::Unavailable("update budget exhausted".to_string()));
        }
        if !state.sessions.contains(handle) {
            return Err(HostError::UnknownSession(handle.id.clone()));
        }
        state.delivered.push(*content);
        Ok(())
    }

    fn end_session(&self, handle: &SessionHandle, dismissal: Dismissal) -> Result<(), HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::End(handle.clone(), dismissal));
        let before = state.sessions.len();
        state.sessions.retain(|h| h != handle);
        if state.sessions.len() == before {
            return Err(HostError::UnknownSession(handle.id.clone()));
        }
        Ok(())
    }
}
