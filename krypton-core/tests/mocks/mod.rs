//! Mock infrastructure for testing
//!
//! Provides an in-memory DRM device, a counting buffer allocator and a
//! device opener that tracks how often the node is opened and closed.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use krypton_core::kms::{
    Connection, ConnectorInfo, CrtcInfo, DumbBuffer, EncoderInfo, FramebufferSpec, KmsDevice,
    KmsOpener, PropertyInfo, ResourceList,
};
use krypton_core::{
    AllocatedBuffer, BufferAllocator, ConnectorKind, DisplayManager, DrmConfig, EncoderKind,
    ModeInfo,
};
use parking_lot::Mutex;

const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const EACCES: i32 = 13;
const EINVAL: i32 = 22;

pub const EDP_CONNECTOR: u32 = 10;
pub const HDMI_CONNECTOR: u32 = 11;
pub const LVDS_ENCODER: u32 = 20;
pub const TMDS_ENCODER: u32 = 21;
pub const CRTC_A: u32 = 30;
pub const CRTC_B: u32 = 31;
pub const DPMS_PROP: u32 = 40;

/// In-memory stand-in for the kernel's KMS state
#[derive(Debug, Default)]
pub struct FakeKernel {
    pub connectors: Vec<ConnectorInfo>,
    pub encoders: Vec<EncoderInfo>,
    pub crtcs: Vec<CrtcInfo>,
    pub properties: Vec<PropertyInfo>,
    /// Ids listed in the resource table that the kernel can't describe
    pub phantom_connectors: Vec<u32>,
    pub broken_encoders: BTreeSet<u32>,
    pub broken_crtcs: BTreeSet<u32>,
    pub fail_resources: bool,
    pub fail_add_fb: bool,
    pub fail_set_crtc: bool,
    pub command_errno: Option<i32>,

    pub next_fb_id: u32,
    pub live_framebuffers: BTreeSet<u32>,
    pub removed_framebuffers: Vec<u32>,
    pub set_crtc_calls: Vec<(u32, u32, ModeInfo)>,
    pub property_sets: Vec<(u32, u32, u64)>,
    pub commands: Vec<(u32, Vec<u8>)>,
    pub next_dumb: u32,
    pub live_dumbs: BTreeSet<u32>,
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// Build a connector record
pub fn connector(
    id: u32,
    kind: ConnectorKind,
    connection: Connection,
    encoder_id: u32,
    modes: Vec<ModeInfo>,
) -> ConnectorInfo {
    ConnectorInfo {
        id,
        encoder_id,
        connector_type: kind,
        connector_type_id: 1,
        connection,
        mm_width: 520,
        mm_height: 290,
        modes,
        props: Vec::new(),
        prop_values: Vec::new(),
        encoders: Vec::new(),
    }
}

pub fn encoder(id: u32, kind: EncoderKind, crtc_id: u32) -> EncoderInfo {
    EncoderInfo {
        id,
        encoder_type: kind,
        crtc_id,
        possible_crtcs: 0b11,
    }
}

pub fn crtc(id: u32) -> CrtcInfo {
    CrtcInfo {
        id,
        ..Default::default()
    }
}

/// Modes from the tie-break scenario: A, B (preferred), C
pub fn tie_break_modes() -> Vec<ModeInfo> {
    vec![
        ModeInfo::new(1920, 1080, 60),
        ModeInfo::new(1920, 1080, 60).preferred(),
        ModeInfo::new(1280, 720, 30),
    ]
}

impl FakeKernel {
    /// eDP panel on the LVDS encoder and CRTC A; HDMI monitor with the
    /// tie-break mode list and no encoder attached yet.
    pub fn dual_head() -> Self {
        Self {
            connectors: vec![
                connector(
                    EDP_CONNECTOR,
                    ConnectorKind::Edp,
                    Connection::Connected,
                    LVDS_ENCODER,
                    vec![ModeInfo::new(1920, 1200, 60).preferred()],
                ),
                connector(
                    HDMI_CONNECTOR,
                    ConnectorKind::HdmiA,
                    Connection::Connected,
                    0,
                    tie_break_modes(),
                ),
            ],
            encoders: vec![
                encoder(LVDS_ENCODER, EncoderKind::Lvds, CRTC_A),
                encoder(TMDS_ENCODER, EncoderKind::Tmds, 0),
            ],
            crtcs: vec![crtc(CRTC_A), crtc(CRTC_B)],
            next_fb_id: 100,
            ..Default::default()
        }
    }

    pub fn connector_mut(&mut self, id: u32) -> &mut ConnectorInfo {
        self.connectors
            .iter_mut()
            .find(|c| c.id == id)
            .expect("connector exists")
    }

    pub fn crtc_mut(&mut self, id: u32) -> &mut CrtcInfo {
        self.crtcs.iter_mut().find(|c| c.id == id).expect("crtc exists")
    }

    /// Give a connector a DPMS property
    pub fn add_dpms(&mut self, connector_id: u32) {
        self.properties.push(PropertyInfo {
            id: DPMS_PROP,
            name: "DPMS".to_string(),
        });
        self.properties.push(PropertyInfo {
            id: DPMS_PROP + 1,
            name: "EDID".to_string(),
        });
        let conn = self.connector_mut(connector_id);
        conn.props = vec![DPMS_PROP + 1, DPMS_PROP];
        conn.prop_values = vec![0, 0];
    }
}

pub type SharedKernel = Arc<Mutex<FakeKernel>>;

/// An "open fd" onto the fake kernel
pub struct FakeDevice {
    kernel: SharedKernel,
    closes: Arc<AtomicUsize>,
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl KmsDevice for FakeDevice {
    fn resources(&self) -> io::Result<ResourceList> {
        let k = self.kernel.lock();
        if k.fail_resources {
            return Err(errno(EACCES));
        }
        let mut connectors = k.phantom_connectors.clone();
        connectors.extend(k.connectors.iter().map(|c| c.id));
        Ok(ResourceList {
            framebuffers: k.live_framebuffers.iter().copied().collect(),
            crtcs: k.crtcs.iter().map(|c| c.id).collect(),
            connectors,
            encoders: k.encoders.iter().map(|e| e.id).collect(),
            min_width: 0,
            max_width: 8192,
            min_height: 0,
            max_height: 8192,
        })
    }

    fn connector(&self, id: u32) -> io::Result<ConnectorInfo> {
        let k = self.kernel.lock();
        k.connectors
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| errno(ENOENT))
    }

    fn encoder(&self, id: u32) -> io::Result<EncoderInfo> {
        let k = self.kernel.lock();
        if k.broken_encoders.contains(&id) {
            return Err(errno(EINVAL));
        }
        k.encoders
            .iter()
            .find(|e| e.id == id)
            .copied()
            .ok_or_else(|| errno(ENOENT))
    }

    fn crtc(&self, id: u32) -> io::Result<CrtcInfo> {
        let k = self.kernel.lock();
        if k.broken_crtcs.contains(&id) {
            return Err(errno(EINVAL));
        }
        k.crtcs
            .iter()
            .find(|c| c.id == id)
            .copied()
            .ok_or_else(|| errno(ENOENT))
    }

    fn property(&self, id: u32) -> io::Result<PropertyInfo> {
        let k = self.kernel.lock();
        k.properties
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| errno(ENOENT))
    }

    fn add_framebuffer(&self, spec: &FramebufferSpec) -> io::Result<u32> {
        let mut k = self.kernel.lock();
        if k.fail_add_fb || spec.handle == 0 || spec.pitch < spec.width {
            return Err(errno(EINVAL));
        }
        k.next_fb_id += 1;
        let id = k.next_fb_id;
        k.live_framebuffers.insert(id);
        Ok(id)
    }

    fn remove_framebuffer(&self, fb_id: u32) -> io::Result<()> {
        let mut k = self.kernel.lock();
        if !k.live_framebuffers.remove(&fb_id) {
            return Err(errno(ENOENT));
        }
        k.removed_framebuffers.push(fb_id);
        // Removing a scanned-out framebuffer switches its CRTC off.
        for crtc in k.crtcs.iter_mut().filter(|c| c.buffer_id == fb_id) {
            crtc.buffer_id = 0;
            crtc.mode_valid = false;
            crtc.mode = ModeInfo::default();
        }
        Ok(())
    }

    fn set_crtc(
        &self,
        crtc_id: u32,
        fb_id: u32,
        _x: u32,
        _y: u32,
        connectors: &[u32],
        mode: Option<&ModeInfo>,
    ) -> io::Result<()> {
        let mut k = self.kernel.lock();
        if k.fail_set_crtc || connectors.is_empty() || !k.live_framebuffers.contains(&fb_id) {
            return Err(errno(EINVAL));
        }
        let mode = mode.copied().ok_or_else(|| errno(EINVAL))?;
        let crtc = k
            .crtcs
            .iter_mut()
            .find(|c| c.id == crtc_id)
            .ok_or_else(|| errno(ENOENT))?;
        crtc.buffer_id = fb_id;
        crtc.mode_valid = true;
        crtc.mode = mode;
        k.set_crtc_calls.push((crtc_id, fb_id, mode));
        Ok(())
    }

    fn set_connector_property(&self, connector_id: u32, prop_id: u32, value: u64) -> io::Result<()> {
        let mut k = self.kernel.lock();
        k.property_sets.push((connector_id, prop_id, value));
        Ok(())
    }

    fn create_dumb(&self, width: u32, _height: u32, bpp: u32) -> io::Result<DumbBuffer> {
        let mut k = self.kernel.lock();
        k.next_dumb += 1;
        let handle = k.next_dumb;
        k.live_dumbs.insert(handle);
        Ok(DumbBuffer {
            handle,
            pitch: width * bpp / 8,
            size: u64::from(width * bpp / 8),
        })
    }

    fn destroy_dumb(&self, handle: u32) -> io::Result<()> {
        let mut k = self.kernel.lock();
        if k.live_dumbs.remove(&handle) {
            Ok(())
        } else {
            Err(errno(ENOENT))
        }
    }

    fn command_write(&self, index: u32, data: &[u8]) -> io::Result<()> {
        let mut k = self.kernel.lock();
        if let Some(code) = k.command_errno {
            return Err(errno(code));
        }
        k.commands.push((index, data.to_vec()));
        Ok(())
    }

    fn command_write_read(&self, index: u32, data: &mut [u8]) -> io::Result<()> {
        let mut k = self.kernel.lock();
        if let Some(code) = k.command_errno {
            return Err(errno(code));
        }
        k.commands.push((index, data.to_vec()));
        for byte in data.iter_mut() {
            *byte = byte.wrapping_add(1);
        }
        Ok(())
    }
}

/// Opens `FakeDevice`s onto a shared kernel and counts opens/closes
#[derive(Clone)]
pub struct FakeOpener {
    pub kernel: SharedKernel,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub fail: bool,
}

impl KmsOpener for FakeOpener {
    fn open(&self, _path: &Path) -> io::Result<Box<dyn KmsDevice>> {
        if self.fail {
            return Err(errno(ENOENT));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDevice {
            kernel: self.kernel.clone(),
            closes: self.closes.clone(),
        }))
    }
}

/// Bookkeeping shared between a `CountingAllocator` and the test
#[derive(Debug, Default)]
pub struct AllocState {
    pub allocated: usize,
    pub released: usize,
    pub double_frees: usize,
    pub live: BTreeMap<u32, (u32, u32)>,
    pub next_handle: u32,
    pub fail: bool,
}

impl AllocState {
    pub fn outstanding(&self) -> usize {
        self.allocated - self.released
    }
}

#[derive(Clone, Default)]
pub struct CountingAllocator {
    pub state: Arc<Mutex<AllocState>>,
}

impl BufferAllocator for CountingAllocator {
    fn allocate(&self, _device: &dyn KmsDevice, width: u32, height: u32) -> io::Result<AllocatedBuffer> {
        let mut s = self.state.lock();
        if s.fail {
            return Err(errno(ENOMEM));
        }
        s.allocated += 1;
        s.next_handle += 1;
        let handle = s.next_handle;
        s.live.insert(handle, (width, height));
        Ok(AllocatedBuffer {
            handle,
            stride: width * 4,
        })
    }

    fn release(&self, _device: &dyn KmsDevice, handle: u32) {
        let mut s = self.state.lock();
        if s.live.remove(&handle).is_none() {
            s.double_frees += 1;
        }
        s.released += 1;
    }
}

/// A manager wired to a fake kernel, plus handles to inspect it
pub struct Harness {
    pub manager: DisplayManager,
    pub kernel: SharedKernel,
    pub alloc: CountingAllocator,
    pub opener: FakeOpener,
}

impl Harness {
    pub fn new(kernel: FakeKernel) -> Self {
        Self::with_config(kernel, DrmConfig::default())
    }

    pub fn with_config(kernel: FakeKernel, config: DrmConfig) -> Self {
        let kernel = Arc::new(Mutex::new(kernel));
        let opener = FakeOpener {
            kernel: kernel.clone(),
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail: false,
        };
        let alloc = CountingAllocator::default();
        let manager =
            DisplayManager::with_backend(config, Box::new(opener.clone()), Box::new(alloc.clone()));
        Self {
            manager,
            kernel,
            alloc,
            opener,
        }
    }

    /// Harness that has already opened the device
    pub fn initialized(kernel: FakeKernel) -> Self {
        let harness = Self::new(kernel);
        harness.manager.initialize().expect("fake device opens");
        harness
    }

    pub fn opens(&self) -> usize {
        self.opener.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.opener.closes.load(Ordering::SeqCst)
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.alloc.state.lock().outstanding()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.kernel.lock().live_framebuffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dual_head_fixture() {
        let kernel = FakeKernel::dual_head();
        assert_eq!(kernel.connectors.len(), 2);
        assert!(kernel.crtcs.iter().all(CrtcInfo::is_spare));
    }

    #[test]
    fn test_counting_allocator_tracks_double_free() {
        let alloc = CountingAllocator::default();
        let kernel: SharedKernel = Arc::new(Mutex::new(FakeKernel::default()));
        let device = FakeDevice {
            kernel,
            closes: Arc::new(AtomicUsize::new(0)),
        };
        let buf = alloc.allocate(&device, 64, 64).expect("Should allocate");
        alloc.release(&device, buf.handle);
        alloc.release(&device, buf.handle);
        assert_eq!(alloc.state.lock().double_frees, 1);
    }
}
