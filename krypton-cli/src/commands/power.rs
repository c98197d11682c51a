//! Power command - DPMS on/off

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use krypton_core::{OutputSlot, PowerMode};

use super::Session;

/// Arguments for the power command
#[derive(Args)]
pub struct PowerArgs {
    /// Power state (on, off)
    state: PowerMode,

    /// Output to switch (primary, external)
    #[arg(short, long, default_value = "external")]
    device: OutputSlot,

    /// Seconds to keep the state before releasing the output
    #[arg(long, default_value = "0")]
    hold: u64,
}

/// Switch an output's display on or off
pub fn power(config: Option<&Path>, args: PowerArgs) -> Result<()> {
    let session = Session::open(config)?;
    let device = args.device.device();

    if !session.detect(device)?.is_connected() {
        bail!("{} output is not connected", args.device);
    }

    session.set_power_mode(device, args.state)?;
    println!("{} output power: {:?}", args.device, args.state);

    session.hold(args.hold);
    Ok(())
}
