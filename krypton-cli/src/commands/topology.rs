//! Topology command - dump the device's KMS objects

use std::path::Path;

use anyhow::{Context, Result};

use super::Session;

/// List every connector, encoder and CRTC the kernel describes
pub fn topology(config: Option<&Path>) -> Result<()> {
    let session = Session::open(config)?;
    let topology = session.topology().context("Failed to read device topology")?;

    println!("Krypton - Device Topology\n");
    println!(
        "Framebuffer limits: {}x{} .. {}x{}\n",
        topology.resources.min_width,
        topology.resources.min_height,
        topology.resources.max_width,
        topology.resources.max_height
    );

    println!(
        "{:<6} {:<14} {:<14} {:<8} {:<10} {}",
        "ID", "Connector", "Status", "Encoder", "Size", "Modes"
    );
    println!("{}", "-".repeat(64));
    for connector in &topology.connectors {
        let size = if connector.mm_width > 0 {
            format!("{}x{}mm", connector.mm_width, connector.mm_height)
        } else {
            "-".to_string()
        };
        println!(
            "{:<6} {:<14} {:<14} {:<8} {:<10} {}",
            connector.id,
            connector.name(),
            connector.connection,
            connector.encoder_id,
            size,
            connector.modes.len()
        );
    }

    println!();
    println!("{:<6} {:<8} {:<6} {}", "ID", "Encoder", "CRTC", "Possible CRTCs");
    println!("{}", "-".repeat(40));
    for encoder in &topology.encoders {
        println!(
            "{:<6} {:<8} {:<6} {:#06b}",
            encoder.id,
            encoder.kind(),
            encoder.crtc_id,
            encoder.possible_crtcs
        );
    }

    println!();
    println!("{:<6} {:<8} {}", "ID", "FB", "Mode");
    println!("{}", "-".repeat(32));
    for crtc in &topology.crtcs {
        let mode = if crtc.mode_valid {
            crtc.mode.to_string()
        } else {
            "off".to_string()
        };
        println!("{:<6} {:<8} {}", crtc.id, crtc.buffer_id, mode);
    }

    Ok(())
}
