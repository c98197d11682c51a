//! Set-mode and refresh commands - change the external output's mode

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use krypton_core::{ModeRequest, DEVICE_EXTERNAL};
use tracing::info;

use super::Session;

/// Arguments for the set-mode command
#[derive(Args)]
pub struct SetModeArgs {
    /// Mode to switch to, e.g. 1920x1080 or 1280x720@60
    mode: ModeRequest,

    /// Seconds to keep the mode before releasing the output
    #[arg(long, default_value = "0")]
    hold: u64,
}

/// Arguments for the refresh command
#[derive(Args)]
pub struct RefreshArgs {
    /// Refresh rate in Hz
    hz: u32,

    /// Seconds to keep the mode before releasing the output
    #[arg(long, default_value = "0")]
    hold: u64,
}

/// Bring up the external output, failing if nothing is attached
fn external(config: Option<&Path>) -> Result<Session> {
    let session = Session::open(config)?;
    if !session.detect(DEVICE_EXTERNAL)?.is_connected() {
        bail!("external output is not connected");
    }
    Ok(session)
}

fn report(session: &Session) {
    match session.mode(DEVICE_EXTERNAL) {
        Some(mode) => println!("External output is now {}", mode),
        None => println!("External output has no active mode"),
    }
}

/// Switch the external output to the requested mode
pub fn set_mode(config: Option<&Path>, args: SetModeArgs) -> Result<()> {
    let session = external(config)?;
    let modes = session.modes(DEVICE_EXTERNAL).unwrap_or_default();

    // Without a refresh rate, the preferred candidate wins
    let mut candidates = modes.iter().filter(|m| args.mode.accepts(m));
    let Some(first) = candidates.next() else {
        let available: Vec<String> = modes.iter().map(ToString::to_string).collect();
        bail!(
            "No {} mode on the external output. Available: {}",
            args.mode,
            available.join(", ")
        );
    };
    let mode = candidates.find(|m| m.is_preferred()).unwrap_or(first);

    info!("Requested {}, using {}", args.mode, mode);
    session
        .set_mode(DEVICE_EXTERNAL, mode)
        .with_context(|| format!("Failed to set mode {}", args.mode))?;

    report(&session);
    session.hold(args.hold);
    Ok(())
}

/// Change the external output's refresh rate at its current size
pub fn refresh(config: Option<&Path>, args: RefreshArgs) -> Result<()> {
    let session = external(config)?;
    session
        .set_refresh_rate(DEVICE_EXTERNAL, args.hz)
        .with_context(|| format!("Failed to set refresh rate {}Hz", args.hz))?;

    if session.mode(DEVICE_EXTERNAL).map(|m| m.vrefresh) != Some(args.hz) {
        println!("No {}Hz mode at the current size, fell back to the preferred mode", args.hz);
    }
    report(&session);
    session.hold(args.hold);
    Ok(())
}
