//! Animation clock: a periodic tick source independent of data refreshes.
//!
//! The live session toggles its sprite frame on every tick. The clock is
//! injected into [`crate::live::LiveSessionManager`] so tests can substitute
//! a [`ManualClock`] and step it deterministically.
//!
//! Handlers run on the clock's own thread. The manager marshals each tick onto
//! its owning context (its state mutex) before touching session state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};


/// Sprite frame period.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(800);

pub type TickHandler = Arc<dyn Fn() + Send + Sync>;

/// Periodic tick source.
///
/// Implementors must guarantee:
/// - `start` while running stops the previous run first (never two tickers)
/// - `stop` is idempotent and a no-op when not running
/// - no tick of a stopped run is delivered after `stop` returns, or if one
///   is already in flight, the handler tolerates it
/// - a failed `start` leaves the clock stopped
pub trait AnimationClock: Send {
    fn start(&mut self, on_tick: TickHandler) -> std::io::Result<()>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Thread-backed clock
// ═══════════════════════════════════════════════════════════════════════════════

struct TickerRun {
    cancelled: Arc<AtomicBool>,
    thread: Thread,
}

/// Wall-clock ticker backed by one detached thread per run.
///
/// `stop` flags the run and wakes the thread; it never joins, so it is safe to
/// call while holding a lock the tick handler also takes.
pub struct ThreadClock {
    interval: Duration,
    run: Option<TickerRun>,
}

impl ThreadClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for ThreadClock {
    fn default() -> Self {
        Self::new(FRAME_INTERVAL)
    }
}

impl AnimationClock for ThreadClock {
    fn start(&mut self, on_tick: TickHandler) -> std::io::Result<()> {
        self.stop();

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("pal-animation-clock".to_string())
            .spawn(move || loop {
                let deadline = Instant::now() + interval;
                loop {
                    if flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
                on_tick();
            })?;

        self.run = Some(TickerRun {
            cancelled,
            thread: handle.thread().clone(),
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancelled.store(true, Ordering::SeqCst);
            run.thread.unpark();
        }
    }

    fn is_running(&self) -> bool {
        self.run.is_some()
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        self.stop();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Manual clock
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ManualState {
    handler: Option<TickHandler>,
    starts: usize,
}

/// Deterministic clock stepped by calling [`ManualClock::tick`].
///
/// Clones share state: hand one clone to the manager, keep another to drive it.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires one tick. Returns false when the clock is stopped.
    pub fn tick(&self) -> bool {
        let handler = self.lock().handler.clone();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Number of times `start` has been called.
    pub fn start_count(&self) -> usize {
        self.lock().starts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AnimationClock for ManualClock {
    fn start(&mut self, on_tick: TickHandler) -> std::io::Result<()> {
        let mut state = self.lock();
        state.handler = Some(on_tick);
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().handler = None;
    }

    fn is_running(&self) -> bool {
        self.lock().handler.is_some()
    }
}
