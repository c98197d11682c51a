//! Display resource manager
//!
//! Owns the DRM device node and the kernel objects bound to the primary and
//! external outputs. One lock covers the whole output table, so discovery,
//! mode commits and queries are serialized against each other.
//!
//! ```no_run
//! use krypton_core::{DisplayManager, DrmConfig, DEVICE_EXTERNAL};
//!
//! let manager = DisplayManager::new(DrmConfig::default());
//! manager.initialize()?;
//! if manager.detect(DEVICE_EXTERNAL)?.is_connected() {
//!     println!("external: {:?}", manager.mode(DEVICE_EXTERNAL));
//! }
//! manager.deinitialize();
//! # Ok::<(), krypton_core::KryptonError>(())
//! ```

mod commit;
mod discovery;

pub use discovery::Topology;

use bytemuck::Pod;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::buffer::{BufferAllocator, DumbBufferAllocator};
use crate::config::DrmConfig;
use crate::error::{KryptonError, Result};
use crate::kms::{CardOpener, KmsDevice, KmsOpener};
use crate::mode::{select_mode, ModeInfo};
use crate::output::{OutputState, Outputs};
use crate::types::{DetectOutcome, OutputSlot, OutputStatus, PhysicalSize, PowerMode};

/// State guarded by the manager lock
struct Inner {
    device: Option<Box<dyn KmsDevice>>,
    allocator: Box<dyn BufferAllocator>,
    outputs: Outputs,
}

impl Inner {
    fn reset_output(&mut self, slot: OutputSlot) {
        self.outputs
            .get_mut(slot)
            .reset(self.device.as_deref(), &*self.allocator);
    }

    fn reset_all(&mut self) {
        for slot in OutputSlot::ALL {
            self.reset_output(slot);
        }
    }

    fn device(&self) -> Result<&dyn KmsDevice> {
        self.device.as_deref().ok_or(KryptonError::NotInitialized)
    }
}

/// Discovers outputs and performs mode-setting on a DRM device
pub struct DisplayManager {
    config: DrmConfig,
    opener: Box<dyn KmsOpener>,
    inner: Mutex<Inner>,
}

impl DisplayManager {
    /// Manager for real hardware: card nodes and dumb buffers
    pub fn new(config: DrmConfig) -> Self {
        let allocator = DumbBufferAllocator::new(config.framebuffer_bpp);
        Self::with_backend(config, Box::new(CardOpener), Box::new(allocator))
    }

    /// Manager with a custom device opener and buffer allocator
    pub fn with_backend(
        config: DrmConfig,
        opener: Box<dyn KmsOpener>,
        allocator: Box<dyn BufferAllocator>,
    ) -> Self {
        Self {
            config,
            opener,
            inner: Mutex::new(Inner {
                device: None,
                allocator,
                outputs: Outputs::default(),
            }),
        }
    }

    pub fn config(&self) -> &DrmConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().device.is_some()
    }

    /// Open the DRM device node. A no-op if already open.
    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.device.is_some() {
            warn!("DRM device is already initialized");
            return Ok(());
        }

        let path = &self.config.device_path;
        let device = self.opener.open(path).map_err(|source| {
            error!("Failed to open DRM device {:?}: {}", path, source);
            KryptonError::DeviceOpen {
                path: path.clone(),
                source,
            }
        })?;

        inner.outputs = Outputs::default();
        inner.device = Some(device);
        info!("Opened DRM device {:?}", path);
        Ok(())
    }

    /// Release every output's kernel objects and close the device node
    pub fn deinitialize(&self) {
        let mut inner = self.inner.lock();
        inner.reset_all();
        if inner.device.take().is_some() {
            info!("Closed DRM device {:?}", self.config.device_path);
        }
    }

    /// Discover what is attached to `device` and bring it up.
    ///
    /// A missing, unresolvable or unplugged external output is not an error;
    /// the slot is left disconnected. On the primary output a missing
    /// connector, encoder or CRTC is reported as an error.
    pub fn detect(&self, device: u32) -> Result<DetectOutcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.device()?;
        let slot = OutputSlot::from_device(device).ok_or(KryptonError::InvalidDevice(device))?;

        inner.reset_output(slot);

        let Inner {
            device: kms,
            allocator,
            outputs,
        } = inner;
        let kms = kms.as_deref().ok_or(KryptonError::NotInitialized)?;
        let output = outputs.get_mut(slot);

        match discovery::discover(kms, &**allocator, &self.config, slot, output) {
            Ok(outcome) => {
                if let DetectOutcome::Connected(mode) = outcome {
                    info!("{} output mode is {}", slot, mode);
                }
                Ok(outcome)
            }
            Err(e) => {
                output.reset(Some(kms), &**allocator);
                let disabled = slot == OutputSlot::External
                    && matches!(
                        e.root(),
                        KryptonError::ConnectorNotFound { .. }
                            | KryptonError::EncoderResolution(_)
                            | KryptonError::CrtcResolution(_)
                    );
                if disabled {
                    warn!("External output is disabled: {}", e);
                    Ok(DetectOutcome::Disabled)
                } else {
                    error!("Failed to detect {} output: {}", slot, e);
                    Err(e)
                }
            }
        }
    }

    /// Switch the external output to `mode`.
    ///
    /// The connector mode equal to `mode` is used; if there is none the
    /// preferred (or first) mode is committed instead.
    pub fn set_mode(&self, device: u32, mode: &ModeInfo) -> Result<()> {
        self.change_mode(device, |candidate, _| mode.matches(candidate))
    }

    /// Switch the external output to another refresh rate at its current size
    pub fn set_refresh_rate(&self, device: u32, hz: u32) -> Result<()> {
        self.change_mode(device, |candidate, current| {
            candidate.hdisplay == current.hdisplay
                && candidate.vdisplay == current.vdisplay
                && candidate.vrefresh == hz
        })
    }

    fn change_mode<F>(&self, device: u32, mut exact: F) -> Result<()>
    where
        F: FnMut(&ModeInfo, &ModeInfo) -> bool,
    {
        let mut guard = self.inner.lock();
        let Inner {
            device: kms,
            allocator,
            outputs,
        } = &mut *guard;
        let kms = kms.as_deref().ok_or(KryptonError::NotInitialized)?;

        let slot = match OutputSlot::from_device(device) {
            Some(OutputSlot::External) => OutputSlot::External,
            _ => {
                warn!("Setting mode on invalid device {}", device);
                return Err(KryptonError::InvalidDevice(device));
            }
        };

        let output = outputs.get_mut(slot);
        let current = output.mode;
        let connector = output
            .connector
            .as_ref()
            .filter(|_| output.connected)
            .ok_or(KryptonError::NotConnected(device))?;
        let index = select_mode(&connector.modes, |candidate| exact(candidate, &current))
            .ok_or(KryptonError::NoModes)?;
        let mode = connector.modes[index];

        commit::commit_mode(kms, &**allocator, &self.config, output, &mode)
    }

    fn with_output<T>(&self, device: u32, f: impl FnOnce(&OutputState) -> Option<T>) -> Option<T> {
        let Some(slot) = OutputSlot::from_device(device) else {
            debug!("Invalid display device {}", device);
            return None;
        };
        let inner = self.inner.lock();
        f(inner.outputs.get(slot))
    }

    /// Active mode of a connected output
    pub fn mode(&self, device: u32) -> Option<ModeInfo> {
        self.with_output(device, OutputState::active_mode)
    }

    /// Physical panel size of a connected output
    pub fn physical_size(&self, device: u32) -> Option<PhysicalSize> {
        self.with_output(device, OutputState::physical_size)
    }

    pub fn is_connected(&self, device: u32) -> bool {
        self.with_output(device, |output| Some(output.connected))
            .unwrap_or(false)
    }

    /// Modes supported by a connected output's connector
    pub fn modes(&self, device: u32) -> Option<Vec<ModeInfo>> {
        self.with_output(device, |output| {
            output
                .connector
                .as_ref()
                .filter(|_| output.connected)
                .map(|c| c.modes.clone())
        })
    }

    /// Snapshot of an output slot
    pub fn status(&self, device: u32) -> Option<OutputStatus> {
        self.with_output(device, |output| Some(output.status()))
    }

    /// Describe every connector, encoder and CRTC on the device
    pub fn topology(&self) -> Result<Topology> {
        let inner = self.inner.lock();
        discovery::topology(inner.device()?)
    }

    /// Turn a connected output's display on or off through its DPMS property
    pub fn set_power_mode(&self, device: u32, mode: PowerMode) -> Result<()> {
        if !self.config.power_control {
            warn!("DPMS ignored, power_control is disabled");
            return Err(KryptonError::Unsupported(
                "power control is disabled".to_string(),
            ));
        }

        let inner = self.inner.lock();
        let kms = inner.device()?;
        let slot = OutputSlot::from_device(device).ok_or(KryptonError::InvalidDevice(device))?;
        let output = inner.outputs.get(slot);
        let connector = output
            .connector
            .as_ref()
            .filter(|_| output.connected)
            .ok_or(KryptonError::NotConnected(device))?;

        for &prop_id in &connector.props {
            let Ok(prop) = kms.property(prop_id) else {
                continue;
            };
            if prop.name != "DPMS" {
                continue;
            }
            return kms
                .set_connector_property(connector.id, prop_id, mode.dpms_value())
                .map_err(|e| {
                    error!("Unable to set DPMS {:?} on {}: {}", mode, connector.name(), e);
                    KryptonError::Io(e).with_context(format!("setting DPMS on {}", connector.name()))
                });
        }

        Err(KryptonError::Unsupported(format!(
            "{} has no DPMS property",
            connector.name()
        )))
    }

    /// Send a driver-private command; the payload is only written
    pub fn write_ioctl(&self, cmd: u32, data: &[u8]) -> Result<()> {
        let inner = self.inner.lock();
        let kms = inner.device()?;
        if data.is_empty() {
            error!("Empty payload for ioctl 0x{:02x}", cmd);
            return Err(KryptonError::InvalidArgument("empty ioctl payload".to_string()));
        }
        kms.command_write(cmd, data).map_err(|e| ioctl_error(cmd, e))
    }

    /// Send a driver-private command and read the payload back
    pub fn write_read_ioctl(&self, cmd: u32, data: &mut [u8]) -> Result<()> {
        let inner = self.inner.lock();
        let kms = inner.device()?;
        if data.is_empty() {
            error!("Empty payload for ioctl 0x{:02x}", cmd);
            return Err(KryptonError::InvalidArgument("empty ioctl payload".to_string()));
        }
        kms.command_write_read(cmd, data).map_err(|e| ioctl_error(cmd, e))
    }

    /// Typed form of `write_ioctl`
    pub fn write_command<T: Pod>(&self, cmd: u32, payload: &T) -> Result<()> {
        self.write_ioctl(cmd, bytemuck::bytes_of(payload))
    }

    /// Typed form of `write_read_ioctl`
    pub fn write_read_command<T: Pod>(&self, cmd: u32, payload: &mut T) -> Result<()> {
        self.write_read_ioctl(cmd, bytemuck::bytes_of_mut(payload))
    }
}

fn ioctl_error(cmd: u32, err: std::io::Error) -> KryptonError {
    match err.raw_os_error() {
        Some(errno) => {
            warn!("Failed to call ioctl 0x{:02x}: {}", cmd, err);
            KryptonError::Ioctl { cmd, errno }
        }
        None => KryptonError::InvalidArgument(err.to_string()),
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.device.is_some() {
            warn!("DisplayManager dropped without deinitialize(), releasing outputs");
            inner.reset_all();
            inner.device = None;
        }
    }
}
