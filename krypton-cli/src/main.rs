//! Krypton CLI
//!
//! Inspect and drive the DRM/KMS outputs of a two-output display board.
//!
//! # Usage
//!
//! ```bash
//! # Show every connector, encoder and CRTC
//! krypton topology
//!
//! # Bring up both outputs and report what is attached
//! krypton detect
//!
//! # Switch the external output to 720p and keep it for 10 seconds
//! krypton set-mode 1280x720@60 --hold 10
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use krypton_core::KryptonError;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Krypton - DRM/KMS output discovery and mode-setting
#[derive(Parser)]
#[command(name = "krypton")]
#[command(author = "GhostKellz")]
#[command(version)]
#[command(about = "DRM/KMS output discovery and mode-setting", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every connector, encoder and CRTC on the device
    Topology,

    /// Detect attached displays and bring them up
    Detect(commands::DetectArgs),

    /// List the modes an output supports
    Modes(commands::ModesArgs),

    /// Change the external output's mode
    SetMode(commands::SetModeArgs),

    /// Change the external output's refresh rate
    Refresh(commands::RefreshArgs),

    /// Turn an output's display on or off
    Power(commands::PowerArgs),

    /// Manage configuration
    Config(commands::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("krypton={}", level).parse()?),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Topology => commands::topology(config),
        Commands::Detect(args) => commands::detect(config, args),
        Commands::Modes(args) => commands::modes(config, args),
        Commands::SetMode(args) => commands::set_mode(config, args),
        Commands::Refresh(args) => commands::refresh(config, args),
        Commands::Power(args) => commands::power(config, args),
        Commands::Config(args) => commands::config(config, args),
    };

    if let Err(e) = &result {
        if let Some(hint) = e.downcast_ref::<KryptonError>().and_then(KryptonError::user_hint) {
            eprintln!("Hint: {}", hint);
        }
    }

    result
}
