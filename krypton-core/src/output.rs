//! Per-slot record of the kernel objects bound to an output

use tracing::warn;

use crate::buffer::{BufferAllocator, Framebuffer};
use crate::kms::{ConnectorInfo, CrtcInfo, EncoderInfo, KmsDevice};
use crate::mode::ModeInfo;
use crate::types::{OutputSlot, OutputStatus, PhysicalSize};

/// Kernel resources currently owned by one output slot
#[derive(Debug, Default)]
pub(crate) struct OutputState {
    /// A connector of the expected type reported a display attached
    pub connected: bool,
    pub connector: Option<ConnectorInfo>,
    pub encoder: Option<EncoderInfo>,
    pub crtc: Option<CrtcInfo>,
    /// Active mode; zeroed when nothing is committed
    pub mode: ModeInfo,
    pub framebuffer: Option<Framebuffer>,
}

impl OutputState {
    /// Drop every held object and retire the framebuffer pair
    pub fn reset(&mut self, device: Option<&dyn KmsDevice>, allocator: &dyn BufferAllocator) {
        self.connected = false;
        self.mode = ModeInfo::default();
        self.connector = None;
        self.encoder = None;
        self.crtc = None;

        if let Some(fb) = self.framebuffer.take() {
            match device {
                Some(device) => fb.release(device, allocator),
                None => warn!("Framebuffer {} outlived its device, leaking", fb.id),
            }
        }
    }

    /// The active mode, if one was committed on a connected output
    pub fn active_mode(&self) -> Option<ModeInfo> {
        (self.connected && !self.mode.is_empty()).then_some(self.mode)
    }

    pub fn physical_size(&self) -> Option<PhysicalSize> {
        let connector = self.connector.as_ref().filter(|_| self.connected)?;
        Some(PhysicalSize {
            width_mm: connector.mm_width,
            height_mm: connector.mm_height,
        })
    }

    pub fn status(&self) -> OutputStatus {
        OutputStatus {
            connected: self.connected,
            connector_id: self.connector.as_ref().map(|c| c.id),
            encoder_id: self.encoder.map(|e| e.id),
            crtc_id: self.crtc.map(|c| c.id),
            mode: (!self.mode.is_empty()).then_some(self.mode),
            framebuffer_id: self.framebuffer.map_or(0, |fb| fb.id),
            buffer_handle: self.framebuffer.map_or(0, |fb| fb.handle),
        }
    }
}

/// The fixed pair of output slots
#[derive(Debug, Default)]
pub(crate) struct Outputs {
    primary: OutputState,
    external: OutputState,
}

impl Outputs {
    pub fn get(&self, slot: OutputSlot) -> &OutputState {
        match slot {
            OutputSlot::Primary => &self.primary,
            OutputSlot::External => &self.external,
        }
    }

    pub fn get_mut(&mut self, slot: OutputSlot) -> &mut OutputState {
        match slot {
            OutputSlot::Primary => &mut self.primary,
            OutputSlot::External => &mut self.external,
        }
    }
}
