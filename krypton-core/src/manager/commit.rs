//! Framebuffer swap for a mode change

use tracing::{error, info, trace};

use crate::buffer::{BufferAllocator, PendingFramebuffer};
use crate::config::DrmConfig;
use crate::error::{KryptonError, Result};
use crate::kms::KmsDevice;
use crate::mode::ModeInfo;
use crate::output::OutputState;

/// Make `mode` the active mode of a connected output.
///
/// A new buffer is allocated, registered and scanned out before the previous
/// framebuffer is retired. If any step fails the new objects are released and
/// the output keeps its previous framebuffer and mode.
pub(super) fn commit_mode(
    device: &dyn KmsDevice,
    allocator: &dyn BufferAllocator,
    config: &DrmConfig,
    output: &mut OutputState,
    mode: &ModeInfo,
) -> Result<()> {
    if mode.matches(&output.mode) {
        trace!("Mode {} is unchanged", mode);
        return Ok(());
    }

    let (Some(crtc), Some(connector)) = (output.crtc, output.connector.as_ref()) else {
        return Err(KryptonError::mode_commit("output has no CRTC or connector bound"));
    };
    let connector_id = connector.id;
    let (width, height) = (mode.width(), mode.height());

    let mut pending = PendingFramebuffer::allocate(device, allocator, width, height).map_err(|e| {
        error!("Failed to allocate {}x{} framebuffer: {}", width, height, e);
        KryptonError::allocation(e.to_string())
    })?;

    let fb_id = pending
        .register(width, height, config.framebuffer_depth, config.framebuffer_bpp)
        .map_err(|e| {
            error!("Failed to add framebuffer: {}", e);
            KryptonError::FramebufferRegistration(e.to_string())
        })?;

    info!("Mode set: {} on CRTC {} (fb {})", mode, crtc.id, fb_id);

    device
        .set_crtc(crtc.id, fb_id, 0, 0, &[connector_id], Some(mode))
        .map_err(|e| {
            error!("Failed to set CRTC {}: {}, keeping previous framebuffer", crtc.id, e);
            KryptonError::mode_commit(e.to_string())
        })?;

    let bound = pending
        .into_bound()
        .ok_or_else(|| KryptonError::mode_commit("framebuffer was not registered"))?;

    output.mode = *mode;
    if let Some(crtc) = output.crtc.as_mut() {
        crtc.buffer_id = bound.id;
    }
    if let Some(previous) = output.framebuffer.replace(bound) {
        previous.release(device, allocator);
    }
    Ok(())
}
