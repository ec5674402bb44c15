//! pixelpal: terminal driver for the Pixel Pal core.
//!
//! Writes and reads the same shared container the app and widget use, and
//! simulates the OS live session registry with a file so sessions outlive
//! a single invocation.
//!
//! ## Subcommands
//!
//! - `steps`: Record a step reading (updates a running live session)
//! - `gender`: Store the onboarding character selection
//! - `status`: Show stored state and live sessions
//! - `widget`: Print the current widget timeline
//! - `live`: Start, stop or run the live session
//! - `assets`: List every sprite asset name

mod commands;
mod host;
mod logging;

use clap::{Parser, Subcommand};
use pal_core::{load_config, Gender, PalConfig, StorageConfig};
use std::path::PathBuf;

use crate::commands::Context;

#[derive(Parser)]
#[command(name = "pixelpal")]
#[command(about = "Pixel Pal companion state tool")]
#[command(version)]
struct Cli {
    /// Data root (default: ~/.pixelpal)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/pixelpal.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record today's step count
    Steps {
        /// Step reading; fractional values are truncated
        #[arg(value_name = "COUNT", allow_negative_numbers = true)]
        count: f64,
    },

    /// Select the character
    Gender {
        #[arg(value_name = "male|female")]
        gender: Gender,
    },

    /// Show stored state and live sessions
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the widget timeline as JSON
    Widget,

    /// Control the live session
    Live {
        #[command(subcommand)]
        command: LiveCommands,
    },

    /// List sprite asset names
    Assets,
}

#[derive(Subcommand)]
enum LiveCommands {
    /// Start a session showing the stored state
    Start,
    /// End the tracked session
    Stop,
    /// End every session the host holds
    StopAll,
    /// Animate the session in the foreground
    Run {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let root = match cli.root.clone() {
        Some(root) => root,
        None => match dirs::home_dir() {
            Some(home) => home.join(".pixelpal"),
            None => {
                eprintln!("pixelpal: home directory not found; pass --root");
                std::process::exit(1);
            }
        },
    };
    let logs_dir = StorageConfig::with_root(root.clone()).logs_dir();
    let _logging_guard = logging::init(Some(logs_dir.as_path()));

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| StorageConfig::with_root(root.clone()).config_file());
    let config = load_config(Some(config_path)).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Falling back to default config");
        PalConfig::default()
    });
    let ctx = Context {
        storage: config.storage_at(&root),
        config,
    };

    let result = match cli.command {
        Commands::Steps { count } => commands::steps(&ctx, count),
        Commands::Gender { gender } => commands::gender(&ctx, gender),
        Commands::Status { json } => commands::status(&ctx, json),
        Commands::Widget => commands::widget(&ctx),
        Commands::Assets => commands::assets(),
        Commands::Live { command } => match command {
            LiveCommands::Start => commands::live_start(&ctx),
            LiveCommands::Stop => commands::live_stop(&ctx),
            LiveCommands::StopAll => commands::live_stop_all(&ctx),
            LiveCommands::Run { seconds } => commands::live_run(&ctx, seconds),
        },
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "pixelpal failed");
        eprintln!("pixelpal: {}", e);
        std::process::exit(1);
    }
}
