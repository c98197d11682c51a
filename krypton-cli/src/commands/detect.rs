//! Detect command - bring up outputs and report what is attached

use std::path::Path;

use anyhow::Result;
use clap::Args;
use krypton_core::{DetectOutcome, OutputSlot, OutputStatus};
use serde::Serialize;

use super::Session;

/// Arguments for the detect command
#[derive(Args)]
pub struct DetectArgs {
    /// Output to detect (primary, external); both if omitted
    #[arg(short, long)]
    device: Option<OutputSlot>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Seconds to keep the outputs up before releasing them
    #[arg(long, default_value = "0")]
    hold: u64,
}

#[derive(Serialize)]
struct DetectReport {
    output: OutputSlot,
    outcome: &'static str,
    status: OutputStatus,
}

fn outcome_name(outcome: &DetectOutcome) -> &'static str {
    match outcome {
        DetectOutcome::Connected(_) => "connected",
        DetectOutcome::Disconnected => "disconnected",
        DetectOutcome::Disabled => "disabled",
    }
}

/// Detect the requested outputs
pub fn detect(config: Option<&Path>, args: DetectArgs) -> Result<()> {
    let session = Session::open(config)?;
    let slots = match args.device {
        Some(slot) => vec![slot],
        None => OutputSlot::ALL.to_vec(),
    };

    let mut reports = Vec::with_capacity(slots.len());
    for slot in slots {
        let outcome = session.detect(slot.device())?;
        reports.push(DetectReport {
            output: slot,
            outcome: outcome_name(&outcome),
            status: session.status(slot.device()).unwrap_or_default(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("Krypton - Output Detection\n");
        println!(
            "{:<10} {:<14} {:<18} {:<10} {:<8} {:<6} {}",
            "Output", "State", "Mode", "Connector", "Encoder", "CRTC", "FB"
        );
        println!("{}", "-".repeat(76));
        for report in &reports {
            let status = &report.status;
            let id = |id: Option<u32>| id.map_or_else(|| "-".to_string(), |id| id.to_string());
            println!(
                "{:<10} {:<14} {:<18} {:<10} {:<8} {:<6} {}",
                report.output,
                report.outcome,
                status.mode.map_or_else(|| "-".to_string(), |m| m.to_string()),
                id(status.connector_id),
                id(status.encoder_id),
                id(status.crtc_id),
                status.framebuffer_id
            );
        }
        for report in &reports {
            if let Some(size) = session.physical_size(report.output.device()) {
                println!(
                    "\n{} panel: {}x{} mm",
                    report.output, size.width_mm, size.height_mm
                );
            }
        }
    }

    session.hold(args.hold);
    Ok(())
}
