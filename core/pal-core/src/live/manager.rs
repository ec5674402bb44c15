//! The live session state machine.
//!
//! States are `Inactive` and `Active(handle, content)`, where the content
//! carries the current animation frame. All transitions run under one mutex,
//! which is the manager's owning context; clock ticks re-enter through the
//! same mutex.
//!
//! Invariant: the animation clock is running if and only if the manager is
//! `Active`. Each activation bumps a run generation that is baked into the
//! tick handler, so a tick from a stopped run is discarded even if it was
//! already in flight when the clock was stopped.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, info, warn};

use super::types::{ContentPayload, Dismissal, LiveOutcome, SessionHandle};
use super::SessionHost;
use crate::clock::{AnimationClock, TickHandler};
use crate::shared::SharedStateStore;
use crate::types::{AnimationFrame, AvatarState, Gender};

/// Callback fired with the new value whenever `is_active` changes.
pub type ActiveListener = Arc<dyn Fn(bool) + Send + Sync>;

struct ActiveSession {
    handle: SessionHandle,
    content: ContentPayload,
}

enum Phase {
    Inactive,
    Active(ActiveSession),
}

struct Inner {
    host: Arc<dyn SessionHost>,
    clock: Box<dyn AnimationClock>,
    phase: Phase,
    generation: u64,
    push_failures: u64,
}

/// Owns at most one live session and keeps its sprite animating.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct LiveSessionManager {
    inner: Arc<Mutex<Inner>>,
    listeners: Mutex<Vec<ActiveListener>>,
}

impl LiveSessionManager {
    /// Creates a manager and adopts any session the host already holds.
    ///
    /// Adopted sessions restart at frame 1 with content rebuilt from the
    /// shared store; session content is never read back from the host.
    pub fn new(
        host: Arc<dyn SessionHost>,
        clock: Box<dyn AnimationClock>,
        store: &SharedStateStore,
    ) -> Self {
        let existing = host.list_sessions();
        let manager = Self {
            inner: Arc::new(Mutex::new(Inner {
                host,
                clock,
                phase: Phase::Inactive,
                generation: 0,
                push_failures: 0,
            })),
            listeners: Mutex::new(Vec::new()),
        };

        if let Some(handle) = existing.first().cloned() {
            if existing.len() > 1 {
                warn!(
                    count = existing.len(),
                    "Host reports multiple live sessions; adopting the first"
                );
            }
            let snapshot = store.snapshot();
            let content = ContentPayload::new(
                snapshot.steps,
                snapshot.state,
                snapshot.render_gender(),
                AnimationFrame::FIRST,
            );
            info!(session = %handle, "Adopting existing live session");
            if let Err(err) = manager.lock().activate(handle, content, &manager.inner) {
                warn!(error = %err, "Animation clock failed; adopted session ended");
            }
        }

        manager
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a fresh session, ending any running one first.
    pub fn start(&self, steps: u32, state: AvatarState, gender: Gender) -> LiveOutcome {
        let content = ContentPayload::new(steps, state, gender, AnimationFrame::FIRST);
        self.transition(|inner, owner| inner.start(content, owner))
    }

    /// Replaces the running session's content, keeping the current frame.
    ///
    /// With no running session this starts one, so a state change is never
    /// silently dropped.
    pub fn update(&self, steps: u32, state: AvatarState, gender: Gender) -> LiveOutcome {
        self.transition(|inner, owner| inner.update(steps, state, gender, owner))
    }

    /// Ends the tracked session. No-op when inactive.
    pub fn stop(&self) {
        self.transition(|inner, _| inner.stop());
    }

    /// Ends every session the host lists for this app, tracked or not.
    pub fn stop_all(&self) {
        self.transition(|inner, _| inner.stop_all());
    }

    /// Drops the tracked session if the host no longer lists it.
    ///
    /// Returns true when the manager is still active afterwards.
    pub fn reconcile(&self) -> bool {
        self.transition(|inner, _| inner.reconcile())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    /// Content last pushed (or about to be pushed) to the session.
    pub fn current_content(&self) -> Option<ContentPayload> {
        match &self.lock().phase {
            Phase::Active(session) => Some(session.content),
            Phase::Inactive => None,
        }
    }

    pub fn current_frame(&self) -> Option<AnimationFrame> {
        self.current_content().map(|content| content.frame)
    }

    pub fn session_handle(&self) -> Option<SessionHandle> {
        match &self.lock().phase {
            Phase::Active(session) => Some(session.handle.clone()),
            Phase::Inactive => None,
        }
    }

    pub fn is_clock_running(&self) -> bool {
        self.lock().clock.is_running()
    }

    /// Count of host update/end calls that failed. Failures are never retried.
    pub fn push_failures(&self) -> u64 {
        self.lock().push_failures
    }

    /// Registers a callback for active/inactive changes.
    ///
    /// Callbacks run after the transition commits, outside the manager lock,
    /// so they may call back into the manager.
    pub fn on_active_changed(&self, listener: ActiveListener) {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition<T>(&self, apply: impl FnOnce(&mut Inner, &Arc<Mutex<Inner>>) -> T) -> T {
        let (result, before, after) = {
            let mut inner = self.lock();
            let before = inner.is_active();
            let result = apply(&mut *inner, &self.inner);
            (result, before, inner.is_active())
        };
        if before != after {
            self.notify(after);
        }
        result
    }

    fn notify(&self, active: bool) {
        let listeners: Vec<ActiveListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            listener(active);
        }
    }
}

impl Drop for LiveSessionManager {
    /// The host session may outlive us; the clock must not.
    fn drop(&mut self) {
        self.lock().clock.stop();
    }
}

impl Inner {
    fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    fn start(&mut self, content: ContentPayload, owner: &Arc<Mutex<Inner>>) -> LiveOutcome {
        if !self.host.capability_enabled() {
            info!("Live sessions are not enabled; start ignored");
            return LiveOutcome::CapabilityUnavailable;
        }

        if self.is_active() {
            self.stop();
        }

        match self.host.request_session(&content) {
            Ok(handle) => match self.activate(handle.clone(), content, owner) {
                Ok(()) => {
                    info!(session = %handle, state = %content.state, steps = content.steps, "Started live session");
                    LiveOutcome::Started
                }
                Err(err) => {
                    warn!(session = %handle, error = %err, "Animation clock failed; live session ended");
                    LiveOutcome::SessionCreateFailed {
                        reason: format!("animation clock unavailable: {}", err),
                    }
                }
            },
            Err(err) => {
                warn!(error = %err, "Failed to start live session");
                LiveOutcome::SessionCreateFailed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn update(
        &mut self,
        steps: u32,
        state: AvatarState,
        gender: Gender,
        owner: &Arc<Mutex<Inner>>,
    ) -> LiveOutcome {
        let (handle, content) = match &mut self.phase {
            Phase::Active(session) => {
                session.content = ContentPayload::new(steps, state, gender, session.content.frame);
                (session.handle.clone(), session.content)
            }
            Phase::Inactive => {
                debug!("Update with no live session; starting one");
                let content = ContentPayload::new(steps, state, gender, AnimationFrame::FIRST);
                return self.start(content, owner);
            }
        };
        self.push(&handle, &content, "update");
        LiveOutcome::Updated
    }

    fn on_tick(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        let (handle, content) = match &mut self.phase {
            Phase::Active(session) => {
                session.content = session.content.with_frame(session.content.frame.toggled());
                (session.handle.clone(), session.content)
            }
            Phase::Inactive => return,
        };
        self.push(&handle, &content, "tick");
    }

    fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        // Clock first so no tick fires against a dead handle.
        self.clock.stop();
        if let Phase::Active(session) = std::mem::replace(&mut self.phase, Phase::Inactive) {
            self.end(&session.handle);
            info!(session = %session.handle, "Ended live session");
        }
    }

    fn stop_all(&mut self) {
        self.clock.stop();
        self.phase = Phase::Inactive;
        let sessions = self.host.list_sessions();
        for handle in &sessions {
            self.end(handle);
        }
        info!(count = sessions.len(), "Ended all live sessions");
    }

    fn reconcile(&mut self) -> bool {
        let handle = match &self.phase {
            Phase::Active(session) => session.handle.clone(),
            Phase::Inactive => return false,
        };
        if self.host.list_sessions().contains(&handle) {
            return true;
        }
        warn!(session = %handle, "Live session no longer held by host; marking inactive");
        self.clock.stop();
        self.phase = Phase::Inactive;
        false
    }

    /// Becomes Active only once the clock runs; otherwise ends the host
    /// session and stays Inactive.
    fn activate(
        &mut self,
        handle: SessionHandle,
        content: ContentPayload,
        owner: &Arc<Mutex<Inner>>,
    ) -> std::io::Result<()> {
        self.generation = self.generation.wrapping_add(1);
        if let Err(err) = self
            .clock
            .start(tick_handler(Arc::downgrade(owner), self.generation))
        {
            self.end(&handle);
            return Err(err);
        }
        self.phase = Phase::Active(ActiveSession { handle, content });
        Ok(())
    }

    fn push(&mut self, handle: &SessionHandle, content: &ContentPayload, reason: &str) {
        match self.host.update_session(handle, content) {
            Ok(()) => debug!(
                session = %handle,
                reason,
                frame = %content.frame,
                state = %content.state,
                "Pushed live session content"
            ),
            Err(err) => {
                self.push_failures += 1;
                let err = err.into_push_failure(reason);
                warn!(session = %handle, error = %err, "Live session push failed");
            }
        }
    }

    fn end(&mut self, handle: &SessionHandle) {
        if let Err(err) = self.host.end_session(handle, Dismissal::Immediate) {
            self.push_failures += 1;
            let err = err.into_push_failure("end");
            warn!(session = %handle, error = %err, "Failed to end live session");
        }
    }
}

fn tick_handler(owner: Weak<Mutex<Inner>>, generation: u64) -> TickHandler {
    Arc::new(move || {
        if let Some(inner) = owner.upgrade() {
            inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .on_tick(generation);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::live::testing::{HostCall, RecordingHost};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<RecordingHost>, ManualClock, LiveSessionManager) {
        setup_with_store(&SharedStateStore::new_in_memory())
    }

    fn setup_with_store(
        store: &SharedStateStore,
    ) -> (Arc<RecordingHost>, ManualClock, LiveSessionManager) {
        let host = Arc::new(RecordingHost::new());
        let clock = ManualClock::new();
        let manager = LiveSessionManager::new(host.clone(), Box::new(clock.clone()), store);
        (host, clock, manager)
    }

    fn payload(steps: u32, state: AvatarState, gender: Gender, frame: u8) -> ContentPayload {
        ContentPayload::new(steps, state, gender, AnimationFrame::clamped(i64::from(frame)))
    }

    fn assert_clock_matches(manager: &LiveSessionManager) {
        assert_eq!(manager.is_clock_running(), manager.is_active());
    }

    /// Clock whose thread can never be spawned.
    struct BrokenClock;

    impl AnimationClock for BrokenClock {
        fn start(&mut self, _on_tick: TickHandler) -> std::io::Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "thread limit reached",
            ))
        }

        fn stop(&mut self) {}

        fn is_running(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_clock_failure_on_start_rolls_back_session() {
        let host = Arc::new(RecordingHost::new());
        let manager = LiveSessionManager::new(
            host.clone(),
            Box::new(BrokenClock),
            &SharedStateStore::new_in_memory(),
        );

        let outcome = manager.start(3_000, AvatarState::Neutral, Gender::Male);

        assert!(matches!(outcome, LiveOutcome::SessionCreateFailed { .. }));
        assert!(!manager.is_active());
        assert_clock_matches(&manager);
        assert!(host.live_sessions().is_empty());
        assert_eq!(host.end_count(), 1);
    }

    #[test]
    fn test_clock_failure_on_adoption_ends_session() {
        let host = Arc::new(RecordingHost::new());
        host.seed_session();
        let manager = LiveSessionManager::new(
            host.clone(),
            Box::new(BrokenClock),
            &SharedStateStore::new_in_memory(),
        );

        assert!(!manager.is_active());
        assert_clock_matches(&manager);
        assert!(host.live_sessions().is_empty());
    }

    #[test]
    fn test_starts_inactive_with_empty_host() {
        let (host, _clock, manager) = setup();
        assert!(!manager.is_active());
        assert!(!manager.is_clock_running());
        assert_eq!(host.calls(), vec![HostCall::List]);
    }

    #[test]
    fn test_start_then_ticks_push_alternating_frames() {
        let (host, clock, manager) = setup();

        let outcome = manager.start(3_000, AvatarState::Neutral, Gender::Male);
        assert_eq!(outcome, LiveOutcome::Started);
        clock.tick();
        clock.tick();

        assert_eq!(
            host.pushes(),
            vec![
                payload(3_000, AvatarState::Neutral, Gender::Male, 1),
                payload(3_000, AvatarState::Neutral, Gender::Male, 2),
                payload(3_000, AvatarState::Neutral, Gender::Male, 1),
            ]
        );
    }

    #[test]
    fn test_update_keeps_frame() {
        let (host, clock, manager) = setup();
        manager.start(100, AvatarState::Low, Gender::Female);
        clock.tick();

        let outcome = manager.update(8_000, AvatarState::Vital, Gender::Female);
        assert_eq!(outcome, LiveOutcome::Updated);
        assert_eq!(
            host.pushes().last().copied(),
            Some(payload(8_000, AvatarState::Vital, Gender::Female, 2))
        );
        assert_eq!(manager.current_frame(), Some(AnimationFrame::SECOND));
    }

    #[test]
    fn test_update_while_inactive_starts() {
        let (host, _clock, manager) = setup();
        let outcome = manager.update(5_000, AvatarState::Neutral, Gender::Female);

        assert_eq!(outcome, LiveOutcome::Started);
        assert!(manager.is_active());
        assert_eq!(
            host.pushes(),
            vec![payload(5_000, AvatarState::Neutral, Gender::Female, 1)]
        );
    }

    #[test]
    fn test_capability_disabled_makes_no_request() {
        let (host, _clock, manager) = setup();
        host.set_enabled(false);
        host.clear_calls();

        let outcome = manager.start(3_000, AvatarState::Neutral, Gender::Male);

        assert_eq!(outcome, LiveOutcome::CapabilityUnavailable);
        assert!(!manager.is_active());
        assert!(!manager.is_clock_running());
        assert_eq!(host.calls(), vec![HostCall::CapabilityCheck]);
    }

    #[test]
    fn test_create_failure_leaves_inactive() {
        let (host, _clock, manager) = setup();
        host.set_fail_requests(true);

        let outcome = manager.start(3_000, AvatarState::Neutral, Gender::Male);

        assert!(matches!(outcome, LiveOutcome::SessionCreateFailed { .. }));
        assert!(!manager.is_active());
        assert_clock_matches(&manager);
    }

    #[test]
    fn test_start_while_active_ends_previous_first() {
        let (host, clock, manager) = setup();
        manager.start(1_000, AvatarState::Low, Gender::Male);
        let first = manager.session_handle().unwrap();
        clock.tick();

        manager.start(9_000, AvatarState::Vital, Gender::Male);
        let second = manager.session_handle().unwrap();

        assert_ne!(first, second);
        assert_eq!(host.live_sessions(), vec![second]);
        assert_eq!(manager.current_frame(), Some(AnimationFrame::FIRST));
        assert_eq!(host.end_count(), 1);
    }

    #[test]
    fn test_stop_twice_ends_once() {
        let (host, _clock, manager) = setup();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);

        manager.stop();
        manager.stop();

        assert!(!manager.is_active());
        assert!(!manager.is_clock_running());
        assert_eq!(host.end_count(), 1);
        assert!(host
            .calls()
            .contains(&HostCall::End(SessionHandle::new("session-1"), Dismissal::Immediate)));
    }

    #[test]
    fn test_stop_when_inactive_makes_no_host_call() {
        let (host, _clock, manager) = setup();
        host.clear_calls();
        manager.stop();
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_tick_after_stop_is_ignored() {
        let (host, clock, manager) = setup();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);
        manager.stop();

        assert!(!clock.tick());
        assert_eq!(host.pushes().len(), 1);
    }

    #[test]
    fn test_stale_generation_tick_is_discarded() {
        let (host, clock, manager) = setup();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);
        let stale = tick_handler(Arc::downgrade(&manager.inner), 0);

        stale();
        assert_eq!(host.pushes().len(), 1);
        clock.tick();
        assert_eq!(host.pushes().len(), 2);
    }

    #[test]
    fn test_adopts_existing_session_from_store() {
        let store = SharedStateStore::new_in_memory();
        store.write(AvatarState::Vital, 9_100).unwrap();
        store.write_gender(Gender::Female).unwrap();

        let host = Arc::new(RecordingHost::new());
        let existing = host.seed_session();
        let clock = ManualClock::new();
        let manager = LiveSessionManager::new(host.clone(), Box::new(clock.clone()), &store);

        assert!(manager.is_active());
        assert!(manager.is_clock_running());
        assert_eq!(manager.session_handle(), Some(existing));
        assert_eq!(
            manager.current_content(),
            Some(payload(9_100, AvatarState::Vital, Gender::Female, 1))
        );

        clock.tick();
        assert_eq!(
            host.pushes(),
            vec![payload(9_100, AvatarState::Vital, Gender::Female, 2)]
        );
    }

    #[test]
    fn test_adoption_defaults_gender_to_male() {
        let host = Arc::new(RecordingHost::new());
        host.seed_session();
        let manager = LiveSessionManager::new(
            host,
            Box::new(ManualClock::new()),
            &SharedStateStore::new_in_memory(),
        );
        assert_eq!(
            manager.current_content(),
            Some(payload(0, AvatarState::Low, Gender::Male, 1))
        );
    }

    #[test]
    fn test_stop_all_sweeps_untracked_sessions() {
        let host = Arc::new(RecordingHost::new());
        host.seed_session();
        host.seed_session();
        let clock = ManualClock::new();
        let manager = LiveSessionManager::new(
            host.clone(),
            Box::new(clock.clone()),
            &SharedStateStore::new_in_memory(),
        );
        assert!(manager.is_active());

        manager.stop_all();

        assert!(!manager.is_active());
        assert!(!manager.is_clock_running());
        assert!(host.live_sessions().is_empty());
        assert_eq!(host.end_count(), 2);
    }

    #[test]
    fn test_stop_all_when_inactive_still_sweeps_host() {
        let (host, _clock, manager) = setup();
        host.seed_session();

        manager.stop_all();

        assert!(host.live_sessions().is_empty());
        assert!(!manager.is_active());
    }

    #[test]
    fn test_push_failure_is_counted_not_retried() {
        let (host, clock, manager) = setup();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);
        host.set_fail_updates(true);

        clock.tick();
        assert_eq!(manager.push_failures(), 1);
        assert!(manager.is_active());

        host.set_fail_updates(false);
        clock.tick();
        assert_eq!(
            host.pushes().last().copied(),
            Some(payload(3_000, AvatarState::Neutral, Gender::Male, 1))
        );
        assert_eq!(manager.push_failures(), 1);
    }

    #[test]
    fn test_reconcile_detects_eviction() {
        let (host, _clock, manager) = setup();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);
        assert!(manager.reconcile());

        let handle = manager.session_handle().unwrap();
        host.evict(&handle);

        assert!(!manager.reconcile());
        assert!(!manager.is_active());
        assert!(!manager.is_clock_running());
    }

    #[test]
    fn test_active_listener_fires_on_changes_only() {
        let (_host, clock, manager) = setup();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        manager.on_active_changed(Arc::new(move |active| {
            sink.lock().unwrap().push(active);
        }));

        manager.start(1, AvatarState::Low, Gender::Male);
        clock.tick();
        manager.update(2, AvatarState::Low, Gender::Male);
        manager.stop();
        manager.stop();

        assert_eq!(*changes.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_listener_may_reenter_manager() {
        let (_host, _clock, manager) = setup();
        let manager = Arc::new(manager);
        let seen = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&manager);
        let counter = Arc::clone(&seen);
        manager.on_active_changed(Arc::new(move |active| {
            if let Some(manager) = weak.upgrade() {
                assert_eq!(manager.is_active(), active);
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        manager.start(1, AvatarState::Low, Gender::Male);
        manager.stop();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clock_tracks_active_across_mixed_sequence() {
        let (host, clock, manager) = setup();

        manager.update(1, AvatarState::Low, Gender::Male);
        assert_clock_matches(&manager);
        clock.tick();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);
        assert_clock_matches(&manager);
        manager.stop();
        assert_clock_matches(&manager);
        clock.tick();
        host.set_fail_requests(true);
        manager.update(8_000, AvatarState::Vital, Gender::Male);
        assert_clock_matches(&manager);
        host.set_fail_requests(false);
        manager.update(8_000, AvatarState::Vital, Gender::Male);
        assert_clock_matches(&manager);
        host.set_enabled(false);
        manager.start(8_000, AvatarState::Vital, Gender::Male);
        assert_clock_matches(&manager);
        manager.stop_all();
        assert_clock_matches(&manager);
        assert!(!manager.is_active());
    }

    #[test]
    fn test_drop_stops_clock_but_keeps_host_session() {
        let (host, clock, manager) = setup();
        manager.start(3_000, AvatarState::Neutral, Gender::Male);
        drop(manager);

        assert!(!clock.is_running());
        assert_eq!(host.live_sessions().len(), 1);
    }
}
