//! Config command - manage configuration files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use krypton_core::config::{sample_config, ConfigFile};

use super::load_config;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the effective configuration
    Show,

    /// Generate a default config file
    Init {
        /// Force overwrite if file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub fn config(path: Option<&Path>, args: ConfigArgs) -> Result<()> {
    let path: PathBuf = path.map_or_else(ConfigFile::default_path, Path::to_path_buf);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            if path.exists() {
                println!("(file exists)");
            } else {
                println!("(file does not exist)");
            }
        }
        ConfigCommand::Show => {
            if !path.exists() {
                println!("No configuration file found at: {}", path.display());
                println!();
                println!("Using default settings. Create a config file with:");
                println!("  krypton config init");
                println!();
            } else {
                println!("Configuration file: {}\n", path.display());
            }

            let config = load_config(Some(&path))?;
            println!("device_path       = {}", config.device_path.display());
            println!("framebuffer_depth = {}", config.framebuffer_depth);
            println!("framebuffer_bpp   = {}", config.framebuffer_bpp);
            println!("power_control     = {}", config.power_control);
            println!(
                "primary           = {} via {}",
                config.primary.connector, config.primary.encoder
            );
            println!(
                "external          = {} via {}",
                config.external.connector, config.external.encoder
            );
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists: {}", path.display());
                println!();
                println!("Use --force to overwrite, or edit the existing file.");
                return Ok(());
            }

            // Create parent directory if needed
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).context("Failed to create config directory")?;
                }
            }

            std::fs::write(&path, sample_config()).context("Failed to write config file")?;

            println!("Created configuration file: {}", path.display());
            println!();
            println!("Edit this file to match your board's connectors.");
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}
