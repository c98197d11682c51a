//! Kernel mode-setting interface
//!
//! `KmsDevice` is the narrow surface the display manager needs from the
//! kernel. `Card` implements it on a `/dev/dri/card*` node through the `drm`
//! crate; tests substitute an in-memory implementation.

mod abi;
mod card;

pub use card::{Card, CardOpener};

use std::io;
use std::path::Path;

use drm::control::connector;

use crate::config::{ConnectorKind, EncoderKind};
use crate::mode::ModeInfo;

/// Object ids the kernel reported for the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceList {
    pub framebuffers: Vec<u32>,
    pub crtcs: Vec<u32>,
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

/// Connector attachment state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connected,
    Disconnected,
    Unknown,
}

impl From<connector::State> for Connection {
    fn from(state: connector::State) -> Self {
        match state {
            connector::State::Connected => Self::Connected,
            connector::State::Disconnected => Self::Disconnected,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A physical output port and what is plugged into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub id: u32,
    /// Encoder currently driving this connector, 0 if none
    pub encoder_id: u32,
    pub connector_type: ConnectorKind,
    pub connector_type_id: u32,
    pub connection: Connection,
    pub mm_width: u32,
    pub mm_height: u32,
    pub modes: Vec<ModeInfo>,
    pub props: Vec<u32>,
    pub prop_values: Vec<u64>,
    pub encoders: Vec<u32>,
}

impl ConnectorInfo {
    pub fn kind(&self) -> ConnectorKind {
        self.connector_type
    }

    /// Name in the kernel's style, e.g. `HDMI-A-1`
    pub fn name(&self) -> String {
        format!("{}-{}", self.kind(), self.connector_type_id)
    }

    pub fn is_connected(&self) -> bool {
        self.connection == Connection::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderInfo {
    pub id: u32,
    pub encoder_type: EncoderKind,
    /// CRTC currently fed by this encoder, 0 if none
    pub crtc_id: u32,
    /// Bit `n` set when the encoder can drive the `n`th CRTC of the resource list
    pub possible_crtcs: u32,
}

impl EncoderInfo {
    pub fn kind(&self) -> EncoderKind {
        self.encoder_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrtcInfo {
    pub id: u32,
    /// Framebuffer being scanned out, 0 if the CRTC is idle
    pub buffer_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    /// Whether `mode` holds a mode already programmed by the kernel
    pub mode_valid: bool,
    pub mode: ModeInfo,
}

impl CrtcInfo {
    /// Not currently driving any framebuffer
    pub fn is_spare(&self) -> bool {
        self.buffer_id == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: u32,
    pub name: String,
}

/// Arguments for registering a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferSpec {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub bpp: u32,
    pub depth: u32,
    /// Buffer object handle backing the pixels
    pub handle: u32,
}

/// A dumb scanout buffer created by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumbBuffer {
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

/// Kernel DRM/KMS operations used by the display manager
pub trait KmsDevice: Send {
    /// Fetch the connector, encoder and CRTC id lists
    fn resources(&self) -> io::Result<ResourceList>;

    fn connector(&self, id: u32) -> io::Result<ConnectorInfo>;

    fn encoder(&self, id: u32) -> io::Result<EncoderInfo>;

    fn crtc(&self, id: u32) -> io::Result<CrtcInfo>;

    fn property(&self, id: u32) -> io::Result<PropertyInfo>;

    /// Register a buffer as a framebuffer object, returning its id
    fn add_framebuffer(&self, spec: &FramebufferSpec) -> io::Result<u32>;

    fn remove_framebuffer(&self, fb_id: u32) -> io::Result<()>;

    /// Scan out `fb_id` on a CRTC through the given connectors
    fn set_crtc(
        &self,
        crtc_id: u32,
        fb_id: u32,
        x: u32,
        y: u32,
        connectors: &[u32],
        mode: Option<&ModeInfo>,
    ) -> io::Result<()>;

    fn set_connector_property(&self, connector_id: u32, prop_id: u32, value: u64) -> io::Result<()>;

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> io::Result<DumbBuffer>;

    fn destroy_dumb(&self, handle: u32) -> io::Result<()>;

    /// Driver-private command, payload copied to the kernel only
    fn command_write(&self, index: u32, data: &[u8]) -> io::Result<()>;

    /// Driver-private command, payload copied in and back out
    fn command_write_read(&self, index: u32, data: &mut [u8]) -> io::Result<()>;
}

/// Opens device nodes into `KmsDevice`s
pub trait KmsOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn KmsDevice>>;
}
