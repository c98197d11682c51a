//! Krypton Core Library
//!
//! DRM/KMS output discovery and mode-setting for a two-output display HAL.
//!
//! This library provides:
//! - Connector/encoder/CRTC discovery for a primary and an external output
//! - Mode selection from the connector's mode list
//! - Framebuffer allocation and CRTC commits that never leak kernel objects
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ DisplayManager  │───▶│  KmsDevice   │───▶│ /dev/dri/card0  │
//! │ (output table)  │    │ (ioctl seam) │    │ (kernel DRM)    │
//! └─────────────────┘    └──────────────┘    └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ BufferAllocator │
//! └─────────────────┘
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod kms;
pub mod manager;
pub mod mode;
mod output;
pub mod types;

pub use buffer::{AllocatedBuffer, BufferAllocator, DumbBufferAllocator};
pub use config::{ConfigFile, ConnectorKind, DrmConfig, EncoderKind, OutputConfig};
pub use error::{KryptonError, Result};
pub use manager::{DisplayManager, Topology};
pub use mode::{ModeInfo, ModeRequest};
pub use types::{
    DetectOutcome, OutputSlot, OutputStatus, PhysicalSize, PowerMode, DEVICE_EXTERNAL,
    DEVICE_PRIMARY, DEVICE_VIRTUAL,
};
