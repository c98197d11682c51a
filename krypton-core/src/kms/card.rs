//! `KmsDevice` backed by a DRM card node

use std::collections::HashMap;
use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::{Bound, RangeBounds};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};

use drm::buffer::{self, Buffer as _, DrmFourcc};
use drm::control::{
    self, connector, crtc, dumbbuffer, encoder, framebuffer, property, Device as ControlDevice,
    RawResourceHandle,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::abi;
use super::{
    ConnectorInfo, CrtcInfo, DumbBuffer, EncoderInfo, FramebufferSpec, KmsDevice, KmsOpener,
    PropertyInfo, ResourceList,
};
use crate::mode::ModeInfo;

/// An open `/dev/dri/card*` node
#[derive(Debug)]
pub struct Card {
    file: File,
    path: PathBuf,
    /// Dumb buffers created through this card, by GEM handle
    dumbs: Mutex<HashMap<u32, dumbbuffer::DumbBuffer>>,
}

impl Card {
    /// Open a card node read-write
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("Opened DRM device {:?} (fd {})", path, file.as_raw_fd());
        Ok(Self {
            file,
            path: path.to_path_buf(),
            dumbs: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the kernel's copy of `mode` among the connectors' mode lists
    fn kernel_mode(
        &self,
        connectors: &[connector::Handle],
        mode: &ModeInfo,
    ) -> io::Result<control::Mode> {
        for &conn in connectors {
            let info = self.get_connector(conn, false)?;
            if let Some(found) = info.modes().iter().find(|m| mode_info(m) == *mode) {
                return Ok(*found);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("mode {} is not offered by the target connectors", mode),
        ))
    }

    /// Issue a driver-private ioctl
    fn ioctl_raw(&self, request: u32, arg: *mut c_void) -> io::Result<()> {
        loop {
            // SAFETY: `arg` points to a live buffer of the size encoded in
            // `request`; the fd stays open for the lifetime of `self`.
            let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg) };
            if ret != -1 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) | Some(libc::EAGAIN) => continue,
                _ => {
                    trace!("ioctl 0x{:08x} failed: {}", request, err);
                    return Err(err);
                }
            }
        }
    }
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl drm::Device for Card {}
impl ControlDevice for Card {}

/// A caller-owned buffer object described by a `FramebufferSpec`
struct SpecBuffer {
    spec: FramebufferSpec,
    handle: buffer::Handle,
}

impl buffer::Buffer for SpecBuffer {
    fn size(&self) -> (u32, u32) {
        (self.spec.width, self.spec.height)
    }

    fn format(&self) -> DrmFourcc {
        // Legacy ADDFB takes depth/bpp; the fourcc is not sent.
        DrmFourcc::Xrgb8888
    }

    fn pitch(&self) -> u32 {
        self.spec.pitch
    }

    fn handle(&self) -> buffer::Handle {
        self.handle
    }
}

fn handle<H: From<RawResourceHandle>>(id: u32) -> io::Result<H> {
    control::from_u32(id).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "object id 0 is not a valid handle")
    })
}

fn raw_id<H: Into<u32>>(handle: Option<H>) -> u32 {
    handle.map_or(0, Into::into)
}

fn ids<H: Copy + Into<u32>>(handles: &[H]) -> Vec<u32> {
    handles.iter().map(|&h| h.into()).collect()
}

/// Inclusive (min, max) of a size range reported by the kernel
fn limits(range: impl RangeBounds<u32>) -> (u32, u32) {
    let min = match range.start_bound() {
        Bound::Included(&v) | Bound::Excluded(&v) => v,
        Bound::Unbounded => 0,
    };
    let max = match range.end_bound() {
        Bound::Included(&v) => v,
        Bound::Excluded(&v) => v.saturating_sub(1),
        Bound::Unbounded => u32::MAX,
    };
    (min, max)
}

fn mode_info(mode: &control::Mode) -> ModeInfo {
    let (hdisplay, vdisplay) = mode.size();
    let (hsync_start, hsync_end, htotal) = mode.hsync();
    let (vsync_start, vsync_end, vtotal) = mode.vsync();
    let mut info = ModeInfo {
        clock: mode.clock(),
        hdisplay,
        hsync_start,
        hsync_end,
        htotal,
        hskew: mode.hskew(),
        vdisplay,
        vsync_start,
        vsync_end,
        vtotal,
        vscan: mode.vscan(),
        vrefresh: mode.vrefresh(),
        flags: mode.flags().bits(),
        mode_type: mode.mode_type().bits(),
        ..ModeInfo::default()
    };
    info.set_name(&mode.name().to_string_lossy());
    info
}

fn command_request(index: u32, len: usize, write_read: bool) -> io::Result<u32> {
    if len == 0 || len > abi::MAX_PAYLOAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload size {} out of range", len),
        ));
    }
    let nr = abi::DRM_COMMAND_BASE
        .checked_add(index)
        .filter(|nr| *nr < abi::DRM_COMMAND_END)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("driver command index {} out of range", index),
            )
        })?;
    Ok(if write_read {
        abi::iowr(nr, len)
    } else {
        abi::iow(nr, len)
    })
}

impl KmsDevice for Card {
    fn resources(&self) -> io::Result<ResourceList> {
        let res = self.resource_handles()?;
        let (min_width, max_width) = limits(res.supported_fb_width());
        let (min_height, max_height) = limits(res.supported_fb_height());
        Ok(ResourceList {
            framebuffers: ids(res.framebuffers()),
            crtcs: ids(res.crtcs()),
            connectors: ids(res.connectors()),
            encoders: ids(res.encoders()),
            min_width,
            max_width,
            min_height,
            max_height,
        })
    }

    fn connector(&self, id: u32) -> io::Result<ConnectorInfo> {
        let conn: connector::Handle = handle(id)?;
        // Forcing a probe refreshes the mode list after hotplug.
        let info = self.get_connector(conn, true)?;
        let props = self.get_properties(conn)?;
        let (prop_ids, prop_values) = props.as_props_and_values();
        let (mm_width, mm_height) = info.size().unwrap_or((0, 0));

        Ok(ConnectorInfo {
            id,
            encoder_id: raw_id(info.current_encoder()),
            connector_type: info.interface().into(),
            connector_type_id: info.interface_id(),
            connection: info.state().into(),
            mm_width,
            mm_height,
            modes: info.modes().iter().map(mode_info).collect(),
            props: ids(prop_ids),
            prop_values: prop_values.to_vec(),
            encoders: ids(info.encoders()),
        })
    }

    fn encoder(&self, id: u32) -> io::Result<EncoderInfo> {
        let info = self.get_encoder(handle::<encoder::Handle>(id)?)?;
        let res = self.resource_handles()?;
        let usable = res.filter_crtcs(info.possible_crtcs());
        let possible_crtcs = res
            .crtcs()
            .iter()
            .enumerate()
            .filter(|(_, crtc)| usable.contains(*crtc))
            .fold(0u32, |mask, (index, _)| {
                mask | 1u32.checked_shl(index as u32).unwrap_or(0)
            });

        Ok(EncoderInfo {
            id,
            encoder_type: info.kind().into(),
            crtc_id: raw_id(info.crtc()),
            possible_crtcs,
        })
    }

    fn crtc(&self, id: u32) -> io::Result<CrtcInfo> {
        let info = self.get_crtc(handle::<crtc::Handle>(id)?)?;
        let (x, y) = info.position();
        let mode = info.mode();
        Ok(CrtcInfo {
            id,
            buffer_id: raw_id(info.framebuffer()),
            x,
            y,
            gamma_size: info.gamma_length(),
            mode_valid: mode.is_some(),
            mode: mode.as_ref().map(mode_info).unwrap_or_default(),
        })
    }

    fn property(&self, id: u32) -> io::Result<PropertyInfo> {
        let info = self.get_property(handle::<property::Handle>(id)?)?;
        Ok(PropertyInfo {
            id,
            name: info.name().to_string_lossy().into_owned(),
        })
    }

    fn add_framebuffer(&self, spec: &FramebufferSpec) -> io::Result<u32> {
        let buffer = SpecBuffer {
            spec: *spec,
            handle: handle(spec.handle)?,
        };
        let fb = ControlDevice::add_framebuffer(self, &buffer, spec.depth, spec.bpp)?;
        Ok(fb.into())
    }

    fn remove_framebuffer(&self, fb_id: u32) -> io::Result<()> {
        self.destroy_framebuffer(handle::<framebuffer::Handle>(fb_id)?)
    }

    fn set_crtc(
        &self,
        crtc_id: u32,
        fb_id: u32,
        x: u32,
        y: u32,
        connectors: &[u32],
        mode: Option<&ModeInfo>,
    ) -> io::Result<()> {
        let crtc: crtc::Handle = handle(crtc_id)?;
        let conns = connectors
            .iter()
            .map(|&id| handle(id))
            .collect::<io::Result<Vec<connector::Handle>>>()?;
        let mode = mode.map(|m| self.kernel_mode(&conns, m)).transpose()?;
        let fb = control::from_u32::<framebuffer::Handle>(fb_id);
        ControlDevice::set_crtc(self, crtc, fb, (x, y), &conns, mode)
    }

    fn set_connector_property(&self, connector_id: u32, prop_id: u32, value: u64) -> io::Result<()> {
        let conn: connector::Handle = handle(connector_id)?;
        let prop: property::Handle = handle(prop_id)?;
        self.set_property(conn, prop, value)
    }

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> io::Result<DumbBuffer> {
        let dumb = self.create_dumb_buffer((width, height), DrmFourcc::Xrgb8888, bpp)?;
        let handle = u32::from(dumb.handle());
        let pitch = dumb.pitch();
        self.dumbs.lock().insert(handle, dumb);
        Ok(DumbBuffer {
            handle,
            pitch,
            size: u64::from(pitch) * u64::from(height),
        })
    }

    fn destroy_dumb(&self, handle: u32) -> io::Result<()> {
        let dumb = self.dumbs.lock().remove(&handle).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no dumb buffer with handle {}", handle),
            )
        })?;
        self.destroy_dumb_buffer(dumb)
    }

    fn command_write(&self, index: u32, data: &[u8]) -> io::Result<()> {
        let request = command_request(index, data.len(), false)?;
        // The kernel only reads from a write-only command's payload.
        self.ioctl_raw(request, data.as_ptr() as *mut c_void)
    }

    fn command_write_read(&self, index: u32, data: &mut [u8]) -> io::Result<()> {
        let request = command_request(index, data.len(), true)?;
        self.ioctl_raw(request, data.as_mut_ptr() as *mut c_void)
    }
}

/// Opens device nodes as `Card`s
#[derive(Debug, Clone, Copy, Default)]
pub struct CardOpener;

impl KmsOpener for CardOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn KmsDevice>> {
        Ok(Box::new(Card::open(path)?))
    }
}
