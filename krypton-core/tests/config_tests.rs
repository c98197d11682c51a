//! Integration tests for configuration system

use krypton_core::config::{sample_config, ConfigFile, ConnectorKind, DrmConfig, EncoderKind};
use krypton_core::types::OutputSlot;
use krypton_core::KryptonError;
use tempfile::TempDir;

#[test]
fn test_default_output_mapping() {
    let config = DrmConfig::default();
    assert_eq!(config.connector_for(OutputSlot::Primary), ConnectorKind::Edp);
    assert_eq!(config.connector_for(OutputSlot::External), ConnectorKind::HdmiA);
    assert_eq!(config.encoder_for(OutputSlot::Primary), EncoderKind::Tmds);
    assert_eq!(config.encoder_for(OutputSlot::External), EncoderKind::Tmds);
    assert!(!config.power_control);
}

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = DrmConfig::default()
        .with_device_path("/dev/dri/card1")
        .with_power_control(true);
    config.external.connector = ConnectorKind::DisplayPort;
    config.primary.encoder = EncoderKind::Lvds;

    ConfigFile::save_to(&config, &path).unwrap();
    assert!(path.exists());

    let loaded = ConfigFile::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let loaded = ConfigFile::load_from(temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded, DrmConfig::default());
}

#[test]
fn test_sample_config_loads_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, sample_config()).unwrap();

    assert_eq!(ConfigFile::load_from(&path).unwrap(), DrmConfig::default());
}

#[test]
fn test_invalid_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[external]\nconnector = \"scart\"\nencoder = \"tmds\"\n").unwrap();

    let err = ConfigFile::load_from(&path).unwrap_err();
    assert!(matches!(err, KryptonError::Config(_)));
    assert!(err.is_user_recoverable());
}

#[test]
fn test_saved_file_uses_kernel_style_names() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    ConfigFile::save_to(&DrmConfig::default(), &path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("connector = \"hdmi-a\""));
    assert!(content.contains("connector = \"edp\""));
    assert!(content.contains("encoder = \"tmds\""));
}

#[test]
fn test_default_path_location() {
    let path = ConfigFile::default_path();
    assert!(path.ends_with("krypton/config.toml"));
}
