//! Configuration for Krypton
//!
//! Maps each output slot to the connector and encoder types expected on the
//! board, and names the DRM device node to open.

mod file;

pub use file::{sample_config, ConfigFile};

use drm::control::{connector, encoder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::OutputSlot;

/// Kernel connector type (`DRM_MODE_CONNECTOR_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectorKind {
    Unknown,
    Vga,
    #[serde(rename = "dvi-i")]
    DviI,
    #[serde(rename = "dvi-d")]
    DviD,
    #[serde(rename = "dvi-a")]
    DviA,
    Composite,
    Svideo,
    Lvds,
    Component,
    #[serde(rename = "din")]
    NinePinDin,
    #[serde(rename = "dp")]
    DisplayPort,
    #[serde(rename = "hdmi-a")]
    HdmiA,
    #[serde(rename = "hdmi-b")]
    HdmiB,
    Tv,
    Edp,
    Virtual,
    Dsi,
    Dpi,
    Writeback,
    Spi,
    Usb,
}

impl From<connector::Interface> for ConnectorKind {
    fn from(interface: connector::Interface) -> Self {
        use connector::Interface;
        match interface {
            Interface::VGA => Self::Vga,
            Interface::DVII => Self::DviI,
            Interface::DVID => Self::DviD,
            Interface::DVIA => Self::DviA,
            Interface::Composite => Self::Composite,
            Interface::SVideo => Self::Svideo,
            Interface::LVDS => Self::Lvds,
            Interface::Component => Self::Component,
            Interface::NinePinDIN => Self::NinePinDin,
            Interface::DisplayPort => Self::DisplayPort,
            Interface::HDMIA => Self::HdmiA,
            Interface::HDMIB => Self::HdmiB,
            Interface::TV => Self::Tv,
            Interface::EmbeddedDisplayPort => Self::Edp,
            Interface::Virtual => Self::Virtual,
            Interface::DSI => Self::Dsi,
            Interface::DPI => Self::Dpi,
            Interface::Writeback => Self::Writeback,
            Interface::SPI => Self::Spi,
            Interface::USB => Self::Usb,
            _ => Self::Unknown,
        }
    }
}

impl ConnectorKind {
    /// Short name matching the kernel's connector naming (e.g. "HDMI-A")
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Vga => "VGA",
            Self::DviI => "DVI-I",
            Self::DviD => "DVI-D",
            Self::DviA => "DVI-A",
            Self::Composite => "Composite",
            Self::Svideo => "SVIDEO",
            Self::Lvds => "LVDS",
            Self::Component => "Component",
            Self::NinePinDin => "DIN",
            Self::DisplayPort => "DP",
            Self::HdmiA => "HDMI-A",
            Self::HdmiB => "HDMI-B",
            Self::Tv => "TV",
            Self::Edp => "eDP",
            Self::Virtual => "Virtual",
            Self::Dsi => "DSI",
            Self::Dpi => "DPI",
            Self::Writeback => "Writeback",
            Self::Spi => "SPI",
            Self::Usb => "USB",
        }
    }
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Kernel encoder type (`DRM_MODE_ENCODER_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderKind {
    None,
    Dac,
    Tmds,
    Lvds,
    Tvdac,
    Virtual,
    Dsi,
    #[serde(rename = "dp-mst")]
    DpMst,
    Dpi,
}

impl From<encoder::Kind> for EncoderKind {
    fn from(kind: encoder::Kind) -> Self {
        use encoder::Kind;
        match kind {
            Kind::DAC => Self::Dac,
            Kind::TMDS => Self::Tmds,
            Kind::LVDS => Self::Lvds,
            Kind::TVDAC => Self::Tvdac,
            Kind::Virtual => Self::Virtual,
            Kind::DSI => Self::Dsi,
            Kind::DPMST => Self::DpMst,
            Kind::DPI => Self::Dpi,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Dac => "DAC",
            Self::Tmds => "TMDS",
            Self::Lvds => "LVDS",
            Self::Tvdac => "TVDAC",
            Self::Virtual => "Virtual",
            Self::Dsi => "DSI",
            Self::DpMst => "DP-MST",
            Self::Dpi => "DPI",
        };
        write!(f, "{}", name)
    }
}

/// Expected hardware for one output slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Connector type to look for
    pub connector: ConnectorKind,
    /// Encoder type to fall back to when the connector has none attached
    pub encoder: EncoderKind,
}

impl OutputConfig {
    pub fn new(connector: ConnectorKind, encoder: EncoderKind) -> Self {
        Self { connector, encoder }
    }
}

/// Device node and output mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmConfig {
    /// DRM device node to open
    #[serde(default = "default_device_path")]
    pub device_path: PathBuf,

    /// Framebuffer color depth
    #[serde(default = "default_depth")]
    pub framebuffer_depth: u32,

    /// Framebuffer bits per pixel
    #[serde(default = "default_bpp")]
    pub framebuffer_bpp: u32,

    /// Allow DPMS power control (not validated on all hardware)
    #[serde(default)]
    pub power_control: bool,

    /// Built-in panel
    #[serde(default = "default_primary")]
    pub primary: OutputConfig,

    /// External display
    #[serde(default = "default_external")]
    pub external: OutputConfig,
}

fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/dri/card0")
}

fn default_depth() -> u32 {
    24
}

fn default_bpp() -> u32 {
    32
}

fn default_primary() -> OutputConfig {
    OutputConfig::new(ConnectorKind::Edp, EncoderKind::Tmds)
}

fn default_external() -> OutputConfig {
    OutputConfig::new(ConnectorKind::HdmiA, EncoderKind::Tmds)
}

impl Default for DrmConfig {
    fn default() -> Self {
        Self {
            device_path: default_device_path(),
            framebuffer_depth: default_depth(),
            framebuffer_bpp: default_bpp(),
            power_control: false,
            primary: default_primary(),
            external: default_external(),
        }
    }
}

impl DrmConfig {
    /// Use a different device node
    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }

    /// Enable or disable DPMS control
    pub fn with_power_control(mut self, enabled: bool) -> Self {
        self.power_control = enabled;
        self
    }

    /// Hardware mapping for a slot
    pub fn output(&self, slot: OutputSlot) -> &OutputConfig {
        match slot {
            OutputSlot::Primary => &self.primary,
            OutputSlot::External => &self.external,
        }
    }

    /// Connector type expected for a slot
    pub fn connector_for(&self, slot: OutputSlot) -> ConnectorKind {
        self.output(slot).connector
    }

    /// Encoder type expected for a slot
    pub fn encoder_for(&self, slot: OutputSlot) -> EncoderKind {
        self.output(slot).encoder
    }
}
