//! Scanout buffer allocation and framebuffer ownership
//!
//! A scanout buffer and the kernel framebuffer object registered on top of it
//! are always created and retired as a pair. `PendingFramebuffer` owns a pair
//! while a mode commit is in flight and releases it on drop unless the commit
//! hands it over to an output with `into_bound`.

use std::io;

use tracing::{debug, warn};

use crate::kms::{FramebufferSpec, KmsDevice};

/// A freshly allocated pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    /// Opaque buffer handle, never 0
    pub handle: u32,
    /// Bytes per row
    pub stride: u32,
}

/// Provides backing memory for mode-set framebuffers
pub trait BufferAllocator: Send {
    fn allocate(&self, device: &dyn KmsDevice, width: u32, height: u32) -> io::Result<AllocatedBuffer>;

    fn release(&self, device: &dyn KmsDevice, handle: u32);
}

/// Allocates kernel dumb buffers on the mode-setting device
#[derive(Debug, Clone, Copy)]
pub struct DumbBufferAllocator {
    bpp: u32,
}

impl DumbBufferAllocator {
    pub fn new(bpp: u32) -> Self {
        Self { bpp }
    }
}

impl Default for DumbBufferAllocator {
    fn default() -> Self {
        Self::new(32)
    }
}

impl BufferAllocator for DumbBufferAllocator {
    fn allocate(&self, device: &dyn KmsDevice, width: u32, height: u32) -> io::Result<AllocatedBuffer> {
        let dumb = device.create_dumb(width, height, self.bpp)?;
        debug!(
            "Created dumb buffer {} ({}x{}, pitch {}, {} bytes)",
            dumb.handle, width, height, dumb.pitch, dumb.size
        );
        Ok(AllocatedBuffer {
            handle: dumb.handle,
            stride: dumb.pitch,
        })
    }

    fn release(&self, device: &dyn KmsDevice, handle: u32) {
        if let Err(e) = device.destroy_dumb(handle) {
            warn!("Failed to destroy dumb buffer {}: {}", handle, e);
        }
    }
}

/// A framebuffer object bound to an output, with its backing buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framebuffer {
    pub id: u32,
    pub handle: u32,
    pub stride: u32,
}

impl Framebuffer {
    /// Remove the framebuffer object, then free its buffer
    pub fn release(self, device: &dyn KmsDevice, allocator: &dyn BufferAllocator) {
        if let Err(e) = device.remove_framebuffer(self.id) {
            warn!("Failed to remove framebuffer {}: {}", self.id, e);
        }
        allocator.release(device, self.handle);
        debug!("Released framebuffer {} (buffer {})", self.id, self.handle);
    }
}

/// Scoped owner of a buffer (and its framebuffer id once registered)
pub struct PendingFramebuffer<'a> {
    device: &'a dyn KmsDevice,
    allocator: &'a dyn BufferAllocator,
    buffer: Option<AllocatedBuffer>,
    fb_id: u32,
}

impl<'a> PendingFramebuffer<'a> {
    /// Allocate a buffer sized for `width` x `height`
    pub fn allocate(
        device: &'a dyn KmsDevice,
        allocator: &'a dyn BufferAllocator,
        width: u32,
        height: u32,
    ) -> io::Result<Self> {
        let buffer = allocator.allocate(device, width, height)?;
        if buffer.handle == 0 {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "allocator returned a null buffer handle",
            ));
        }
        Ok(Self {
            device,
            allocator,
            buffer: Some(buffer),
            fb_id: 0,
        })
    }

    /// Register the buffer as a kernel framebuffer object
    pub fn register(&mut self, width: u32, height: u32, depth: u32, bpp: u32) -> io::Result<u32> {
        let Some(buffer) = self.buffer else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no buffer to register"));
        };
        let fb_id = self.device.add_framebuffer(&FramebufferSpec {
            width,
            height,
            pitch: buffer.stride,
            bpp,
            depth,
            handle: buffer.handle,
        })?;
        self.fb_id = fb_id;
        Ok(fb_id)
    }

    /// Hand ownership to the caller; nothing is released
    pub fn into_bound(mut self) -> Option<Framebuffer> {
        let buffer = self.buffer.take()?;
        if self.fb_id == 0 {
            self.buffer = Some(buffer);
            return None;
        }
        Some(Framebuffer {
            id: std::mem::take(&mut self.fb_id),
            handle: buffer.handle,
            stride: buffer.stride,
        })
    }
}

impl Drop for PendingFramebuffer<'_> {
    fn drop(&mut self) {
        if self.fb_id != 0 {
            if let Err(e) = self.device.remove_framebuffer(self.fb_id) {
                warn!("Failed to remove unused framebuffer {}: {}", self.fb_id, e);
            }
        }
        if let Some(buffer) = self.buffer.take() {
            self.allocator.release(self.device, buffer.handle);
            debug!("Released unused buffer {}", buffer.handle);
        }
    }
}
