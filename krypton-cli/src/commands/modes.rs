//! Modes command - list supported modes

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use krypton_core::OutputSlot;

use super::Session;

/// Arguments for the modes command
#[derive(Args)]
pub struct ModesArgs {
    /// Output to inspect (primary, external)
    #[arg(short, long, default_value = "external")]
    device: OutputSlot,
}

/// List the modes of a connected output
pub fn modes(config: Option<&Path>, args: ModesArgs) -> Result<()> {
    let session = Session::open(config)?;
    let device = args.device.device();

    if !session.detect(device)?.is_connected() {
        bail!("{} output is not connected", args.device);
    }

    let active = session.mode(device);
    let modes = session.modes(device).unwrap_or_default();

    println!("Krypton - {} Output Modes\n", args.device);
    println!("{:<3} {:<18} {:<10} {}", "", "Mode", "Clock", "Name");
    println!("{}", "-".repeat(44));
    for mode in &modes {
        let marker = match (Some(*mode) == active, mode.is_preferred()) {
            (true, _) => "*",
            (false, true) => "+",
            _ => "",
        };
        println!(
            "{:<3} {:<18} {:<10} {}",
            marker,
            mode.to_string(),
            format!("{}kHz", mode.clock),
            mode.name()
        );
    }
    println!("\n* active, + preferred");

    Ok(())
}
