//! CLI command implementations

mod config;
mod detect;
mod modes;
mod power;
mod set_mode;
mod topology;

pub use config::{config, ConfigArgs};
pub use detect::{detect, DetectArgs};
pub use modes::{modes, ModesArgs};
pub use power::{power, PowerArgs};
pub use set_mode::{refresh, set_mode, RefreshArgs, SetModeArgs};
pub use topology::topology;

use std::ops::Deref;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use krypton_core::{ConfigFile, DisplayManager, DrmConfig};
use tracing::debug;

/// Load the configuration named by `--config`, or the default one
fn load_config(path: Option<&Path>) -> Result<DrmConfig> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    debug!("Using DRM device {:?}", config.device_path);
    Ok(config)
}

/// An initialized manager that tears down when the command finishes
struct Session {
    manager: DisplayManager,
}

impl Session {
    fn open(config: Option<&Path>) -> Result<Self> {
        let manager = DisplayManager::new(load_config(config)?);
        manager.initialize()?;
        Ok(Self { manager })
    }

    /// Keep the current configuration on screen before teardown
    fn hold(&self, secs: u64) {
        if secs > 0 {
            println!("Holding for {}s...", secs);
            std::thread::sleep(Duration::from_secs(secs));
        }
    }
}

impl Deref for Session {
    type Target = DisplayManager;

    fn deref(&self) -> &DisplayManager {
        &self.manager
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.manager.deinitialize();
    }
}
