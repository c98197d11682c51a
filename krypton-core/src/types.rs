//! Core types for Krypton
//!
//! Caller-visible device identifiers and the fixed pair of output slots
//! they resolve to.

use serde::{Deserialize, Serialize};

use crate::mode::ModeInfo;

/// Built-in panel
pub const DEVICE_PRIMARY: u32 = 0;
/// External/secondary display (HDMI, DP)
pub const DEVICE_EXTERNAL: u32 = 1;
/// Virtual display; never backed by a KMS output
pub const DEVICE_VIRTUAL: u32 = 2;

/// One of the two fixed logical outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSlot {
    /// Primary display
    Primary,
    /// External display
    External,
}

impl OutputSlot {
    /// Both slots, primary first
    pub const ALL: [OutputSlot; 2] = [OutputSlot::Primary, OutputSlot::External];

    /// Resolve a caller device identifier to a slot
    pub fn from_device(device: u32) -> Option<Self> {
        match device {
            DEVICE_PRIMARY => Some(Self::Primary),
            DEVICE_EXTERNAL => Some(Self::External),
            _ => None,
        }
    }

    /// The caller device identifier for this slot
    pub fn device(&self) -> u32 {
        match self {
            Self::Primary => DEVICE_PRIMARY,
            Self::External => DEVICE_EXTERNAL,
        }
    }
}

impl std::fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for OutputSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" | "internal" | "0" => Ok(Self::Primary),
            "external" | "secondary" | "1" => Ok(Self::External),
            _ => Err(format!("Unknown output: {}", s)),
        }
    }
}

/// Display power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    On,
    Off,
}

impl PowerMode {
    /// Kernel DPMS property value
    pub fn dpms_value(&self) -> u64 {
        match self {
            Self::On => 0,
            Self::Off => 3,
        }
    }
}

impl std::str::FromStr for PowerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "1" => Ok(Self::On),
            "off" | "0" => Ok(Self::Off),
            _ => Err(format!("Unknown power mode: {}", s)),
        }
    }
}

/// Physical panel dimensions reported by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhysicalSize {
    pub width_mm: u32,
    pub height_mm: u32,
}

/// Result of a successful `detect` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectOutcome {
    /// A display is attached and a mode is active
    Connected(ModeInfo),
    /// The connector exists but nothing is plugged in
    Disconnected,
    /// The external output could not be brought up; treated as switched off
    Disabled,
}

impl DetectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Read-only snapshot of an output slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputStatus {
    pub connected: bool,
    pub connector_id: Option<u32>,
    pub encoder_id: Option<u32>,
    pub crtc_id: Option<u32>,
    pub mode: Option<ModeInfo>,
    pub framebuffer_id: u32,
    pub buffer_handle: u32,
}
