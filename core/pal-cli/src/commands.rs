//! Subcommand handlers.
//!
//! Each handler builds what it needs from a [`Context`] and drops it before
//! returning. A live session manager constructed here adopts the session a
//! previous invocation left in the file host, the same way the app adopts an
//! OS session after a relaunch.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pal_core::classifier::steps_from_reading;
use pal_core::{
    AvatarSnapshot, Gender, LiveSync, PalConfig, PalEngine, PalError, SharedStateStore,
    StorageConfig, SurfaceReloader, ThreadClock,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::host::{FileSessionHost, HostedSession};

/// How often `live run` checks that its session still exists.
const RECONCILE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Pal(#[from] PalError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Reloader that only records the signal; the CLI has no widget process.
struct LoggingReloader;

impl SurfaceReloader for LoggingReloader {
    fn reload_all(&self) {
        debug!("Widget timeline reload requested");
    }
}

pub struct Context {
    pub storage: StorageConfig,
    pub config: PalConfig,
}

impl Context {
    fn engine(&self) -> PalEngine {
        PalEngine::with_store(
            SharedStateStore::open(&self.storage).with_reloader(Arc::new(LoggingReloader)),
        )
    }

    fn host(&self) -> Arc<FileSessionHost> {
        Arc::new(FileSessionHost::new(
            self.storage.host_sessions_file(),
            self.config.live.enabled,
        ))
    }

    fn live_sync(&self) -> LiveSync {
        LiveSync::new(
            self.engine(),
            self.host(),
            Box::new(ThreadClock::new(self.config.frame_interval())),
        )
    }
}

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    avatar: AvatarSnapshot,
    sprite: String,
    sessions: Vec<SessionReport>,
}

#[derive(Serialize)]
struct SessionReport {
    id: String,
    sprite: String,
    #[serde(flatten)]
    session: HostedSession,
}

/// `pixelpal steps <count>`
pub fn steps(ctx: &Context, reading: f64) -> Result<(), CliError> {
    let sync = ctx.live_sync();
    let snapshot = sync.record_steps(steps_from_reading(reading));
    info!(steps = snapshot.steps, state = %snapshot.state, "Recorded steps");
    println!(
        "{} steps: {} ({})",
        snapshot.steps,
        snapshot.state,
        snapshot.state.description()
    );
    if sync.manager().is_active() {
        println!("Live session updated");
    }
    Ok(())
}

/// `pixelpal gender <male|female>`
pub fn gender(ctx: &Context, gender: Gender) -> Result<(), CliError> {
    ctx.engine().store().write_gender(gender)?;
    println!("Character: {}", gender.display_name());
    Ok(())
}

/// `pixelpal status [--json]`
pub fn status(ctx: &Context, json: bool) -> Result<(), CliError> {
    let report = status_report(ctx);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let avatar = &report.avatar;
    println!("State:    {} ({})", avatar.state, avatar.state.description());
    println!("Steps:    {}", avatar.steps);
    match avatar.gender {
        Some(gender) => println!("Gender:   {}", gender.display_name()),
        None => println!("Gender:   not selected"),
    }
    println!(
        "Updated:  {}",
        avatar.last_update.as_deref().unwrap_or("never")
    );
    println!("Sprite:   {}", report.sprite);
    if report.sessions.is_empty() {
        println!("Live:     none");
    }
    for session in &report.sessions {
        println!("Live:     {} showing {}", session.id, session.sprite);
    }
    Ok(())
}

fn status_report(ctx: &Context) -> StatusReport {
    let engine = ctx.engine();
    let avatar = engine.snapshot();
    let sprite = pal_core::sprites::sprite_name(
        avatar.render_gender(),
        avatar.state,
        pal_core::AnimationFrame::FIRST,
    );
    let sessions = ctx
        .host()
        .sessions()
        .into_iter()
        .map(|(handle, session)| SessionReport {
            id: handle.id,
            sprite: session.content.sprite_name(),
            session,
        })
        .collect();
    StatusReport {
        avatar,
        sprite,
        sessions,
    }
}

/// `pixelpal widget`: prints the timeline the widget would render now.
pub fn widget(ctx: &Context) -> Result<(), CliError> {
    let timeline = ctx.engine().widget_timeline();
    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}

/// `pixelpal assets`
pub fn assets() -> Result<(), CliError> {
    for name in pal_core::sprites::all_asset_names() {
        println!("{}", name);
    }
    Ok(())
}

/// `pixelpal live start`
pub fn live_start(ctx: &Context) -> Result<(), CliError> {
    let sync = ctx.live_sync();
    sync.start_session().into_result()?;
    print_session(&sync);
    Ok(())
}

/// `pixelpal live stop`
pub fn live_stop(ctx: &Context) -> Result<(), CliError> {
    let sync = ctx.live_sync();
    if !sync.manager().is_active() {
        println!("No live session running");
        return Ok(());
    }
    sync.stop_session();
    println!("Live session ended");
    Ok(())
}

/// `pixelpal live stop-all`
pub fn live_stop_all(ctx: &Context) -> Result<(), CliError> {
    let sync = ctx.live_sync();
    sync.manager().stop_all();
    println!("All live sessions ended");
    Ok(())
}

/// `pixelpal live run --seconds N`: animates the session in the foreground.
///
/// Starts a session if none exists. Returns early when the session is ended
/// from elsewhere (another `pixelpal live stop`). The session is left
/// running on exit.
pub fn live_run(ctx: &Context, seconds: u64) -> Result<(), CliError> {
    let sync = ctx.live_sync();
    sync.manager().on_active_changed(Arc::new(|active| {
        info!(active, "Live session active state changed");
    }));

    if !sync.manager().is_active() {
        sync.start_session().into_result()?;
    }
    print_session(&sync);

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        thread::sleep(RECONCILE_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        if !sync.manager().reconcile() {
            warn!("Live session ended elsewhere");
            println!("Live session ended elsewhere");
            return Ok(());
        }
    }

    let failures = sync.manager().push_failures();
    if failures > 0 {
        warn!(failures, "Some live session pushes failed");
    }
    if let Some(content) = sync.manager().current_content() {
        println!("Last frame: {}", content.sprite_name());
    }
    Ok(())
}

fn print_session(sync: &LiveSync) {
    if let (Some(handle), Some(content)) = (
        sync.manager().session_handle(),
        sync.manager().current_content(),
    ) {
        println!("Live session {} showing {}", handle, content.sprite_name());
    }
}
