//! Error types for Krypton

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KryptonError
pub type Result<T> = std::result::Result<T, KryptonError>;

/// Main error type for display resource operations
#[derive(Debug, Error)]
pub enum KryptonError {
    /// The device node has not been opened
    #[error("DRM device is not initialized")]
    NotInitialized,

    /// Unknown or unsupported logical device identifier
    #[error("Invalid display device: {0}")]
    InvalidDevice(u32),

    /// Kernel could not supply the connector/encoder/CRTC list
    #[error("Failed to query DRM resources: {0}")]
    ResourceQuery(String),

    /// No connector of the expected type exists on the device
    #[error("No {connector} connector found for device {device}")]
    ConnectorNotFound { device: u32, connector: String },

    /// No encoder could be attached to the connector
    #[error("Failed to resolve an encoder: {0}")]
    EncoderResolution(String),

    /// No CRTC could be attached to the encoder
    #[error("Failed to resolve a CRTC: {0}")]
    CrtcResolution(String),

    /// Pixel buffer allocation failed
    #[error("Framebuffer allocation failed: {0}")]
    Allocation(String),

    /// The kernel rejected the new framebuffer object
    #[error("Framebuffer registration failed: {0}")]
    FramebufferRegistration(String),

    /// The kernel rejected the CRTC bind
    #[error("Mode commit failed: {0}")]
    ModeCommit(String),

    /// Raw ioctl passthrough failed
    #[error("ioctl 0x{cmd:02x} failed with errno {errno}")]
    Ioctl { cmd: u32, errno: i32 },

    /// The device node could not be opened
    #[error("Failed to open {}: {source}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The output has no attached display
    #[error("Device {0} is not connected")]
    NotConnected(u32),

    /// The connector reported an empty mode list
    #[error("Connector reports no modes")]
    NoModes,

    /// Unsupported operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KryptonError>,
    },
}

impl KryptonError {
    /// Create a resource query error
    pub fn resource_query(msg: impl Into<String>) -> Self {
        Self::ResourceQuery(msg.into())
    }

    /// Create an allocation error
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Create a mode commit error
    pub fn mode_commit(msg: impl Into<String>) -> Self {
        Self::ModeCommit(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &KryptonError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Kernel errno carried by this error, if any
    pub fn errno(&self) -> Option<i32> {
        match self.root() {
            Self::Ioctl { errno, .. } => Some(*errno),
            Self::DeviceOpen { source, .. } | Self::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// Actionable hint for the user, if one applies
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::NotInitialized => Some("Call initialize() before querying outputs"),
            Self::DeviceOpen { .. } => Some(
                "Check the device_path in config.toml and that your user is in the 'video' group",
            ),
            Self::ConnectorNotFound { .. } => {
                Some("Run 'krypton topology' to see which connector types the device exposes")
            }
            Self::NotConnected(_) => Some("Attach a display and run 'krypton detect' again"),
            Self::ModeCommit(_) | Self::FramebufferRegistration(_) => {
                Some("Mode-setting requires DRM master; stop the running compositor first")
            }
            Self::Config(_) => Some("Check your config.toml; 'krypton config sample' prints a valid one"),
            Self::Unsupported(_) => Some("Set power_control = true in config.toml to enable DPMS"),
            _ => None,
        }
    }

    /// Whether the user can fix this without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::NotInitialized
                | Self::InvalidDevice(_)
                | Self::ConnectorNotFound { .. }
                | Self::NotConnected(_)
                | Self::DeviceOpen { .. }
                | Self::Config(_)
                | Self::InvalidArgument(_)
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl From<toml::de::Error> for KryptonError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config file: {}", err))
    }
}

impl From<toml::ser::Error> for KryptonError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(format!("Failed to serialize config: {}", err))
    }
}
