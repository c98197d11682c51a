//! Configuration file loading and saving
//!
//! Loads user configuration from `~/.config/krypton/config.toml`

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::DrmConfig;
use crate::error::{KryptonError, Result};

/// Loader for the on-disk `DrmConfig`
pub struct ConfigFile;

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("krypton").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("krypton")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/krypton/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<DrmConfig> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<DrmConfig> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(DrmConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| KryptonError::Config(format!("Failed to read config file: {}", e)))?;

        let config: DrmConfig = toml::from_str(&content)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> DrmConfig {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                DrmConfig::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(config: &DrmConfig, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    KryptonError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(config)?;

        std::fs::write(path, content)
            .map_err(|e| KryptonError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Krypton Configuration

# DRM device node
device_path = "/dev/dri/card0"

# Framebuffer format used for mode-set buffers
framebuffer_depth = 24
framebuffer_bpp = 32

# Allow DPMS on/off through the connector "DPMS" property.
# Off by default: not validated on all hardware.
power_control = false

# Connector types: vga, dvi-i, dvi-d, dvi-a, composite, svideo, lvds,
#   component, din, dp, hdmi-a, hdmi-b, tv, edp, virtual, dsi, dpi
# Encoder types: none, dac, tmds, lvds, tvdac, virtual, dsi, dp-mst, dpi

[primary]
connector = "edp"
encoder = "tmds"

[external]
connector = "hdmi-a"
encoder = "tmds"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorKind;

    #[test]
    fn test_sample_config_parses() {
        let config: DrmConfig = toml::from_str(&sample_config()).unwrap();
        assert_eq!(config, DrmConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DrmConfig = toml::from_str(
            r#"
            [external]
            connector = "dp"
            encoder = "tmds"
            "#,
        )
        .unwrap();
        assert_eq!(config.external.connector, ConnectorKind::DisplayPort);
        assert_eq!(config.primary.connector, ConnectorKind::Edp);
        assert_eq!(config.framebuffer_bpp, 32);
    }
}
