//! Connector/encoder/CRTC topology walk

use std::io;

use tracing::{debug, error, info, warn};

use super::commit::commit_mode;
use crate::buffer::BufferAllocator;
use crate::config::{DrmConfig, EncoderKind};
use crate::error::{KryptonError, Result};
use crate::kms::{ConnectorInfo, CrtcInfo, EncoderInfo, KmsDevice, ResourceList};
use crate::mode::select_mode;
use crate::output::OutputState;
use crate::types::{DetectOutcome, OutputSlot};

/// Everything the kernel describes on a device
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub resources: ResourceList,
    pub connectors: Vec<ConnectorInfo>,
    pub encoders: Vec<EncoderInfo>,
    pub crtcs: Vec<CrtcInfo>,
}

/// Lazily describe each object in `ids`, skipping ones the kernel can't
fn scan<T, F>(ids: &[u32], what: &'static str, mut describe: F) -> impl Iterator<Item = T>
where
    F: FnMut(u32) -> io::Result<T>,
{
    ids.iter().filter_map(move |&id| {
        if id == 0 {
            warn!("Kernel resource list has an empty {} entry", what);
            return None;
        }
        match describe(id) {
            Ok(obj) => Some(obj),
            Err(e) => {
                warn!("Failed to get {} {}: {}", what, id, e);
                None
            }
        }
    })
}

pub(super) fn query_resources(device: &dyn KmsDevice) -> Result<ResourceList> {
    device.resources().map_err(|e| {
        error!("Failed to get DRM resources: {}", e);
        KryptonError::resource_query(e.to_string())
    })
}

/// Describe every connector, encoder and CRTC, best effort
pub(super) fn topology(device: &dyn KmsDevice) -> Result<Topology> {
    let resources = query_resources(device)?;
    let connectors = scan(&resources.connectors, "connector", |id| device.connector(id)).collect();
    let encoders = scan(&resources.encoders, "encoder", |id| device.encoder(id)).collect();
    let crtcs = scan(&resources.crtcs, "crtc", |id| device.crtc(id)).collect();
    Ok(Topology {
        resources,
        connectors,
        encoders,
        crtcs,
    })
}

fn resolve_encoder(
    device: &dyn KmsDevice,
    resources: &ResourceList,
    connector: &ConnectorInfo,
    wanted: EncoderKind,
) -> Option<EncoderInfo> {
    if connector.encoder_id != 0 {
        info!(
            "Connector {} has encoder {} attached",
            connector.name(),
            connector.encoder_id
        );
        match device.encoder(connector.encoder_id) {
            Ok(encoder) => return Some(encoder),
            Err(e) => warn!(
                "Failed to get attached encoder {}: {}, scanning for one",
                connector.encoder_id, e
            ),
        }
    }

    debug!("Scanning for a {} encoder for {}", wanted, connector.name());
    scan(&resources.encoders, "encoder", |id| device.encoder(id)).find(|e| e.kind() == wanted)
}

fn resolve_crtc(
    device: &dyn KmsDevice,
    resources: &ResourceList,
    encoder: &EncoderInfo,
) -> Option<CrtcInfo> {
    if encoder.crtc_id != 0 {
        info!("Encoder {} has CRTC {} attached", encoder.id, encoder.crtc_id);
        match device.crtc(encoder.crtc_id) {
            Ok(crtc) => return Some(crtc),
            Err(e) => warn!(
                "Failed to get attached CRTC {}: {}, scanning for a spare one",
                encoder.crtc_id, e
            ),
        }
    }

    debug!("Scanning for a spare CRTC for encoder {}", encoder.id);
    scan(&resources.crtcs, "crtc", |id| device.crtc(id)).find(CrtcInfo::is_spare)
}

/// Walk the topology for `slot` and fill in `output`.
///
/// On error `output` may be partially populated; the caller resets it.
pub(super) fn discover(
    device: &dyn KmsDevice,
    allocator: &dyn BufferAllocator,
    config: &DrmConfig,
    slot: OutputSlot,
    output: &mut OutputState,
) -> Result<DetectOutcome> {
    let resources = query_resources(device)?;

    let wanted = config.connector_for(slot);
    let connector = scan(&resources.connectors, "connector", |id| device.connector(id))
        .find(|c| c.kind() == wanted)
        .ok_or_else(|| KryptonError::ConnectorNotFound {
            device: slot.device(),
            connector: wanted.to_string(),
        })?;

    if !connector.is_connected() {
        info!("{} output ({}) is not connected", slot, connector.name());
        return Ok(DetectOutcome::Disconnected);
    }

    let encoder = resolve_encoder(device, &resources, &connector, config.encoder_for(slot))
        .ok_or_else(|| {
            KryptonError::EncoderResolution(format!("no usable encoder for {}", connector.name()))
        })?;

    let crtc = resolve_crtc(device, &resources, &encoder).ok_or_else(|| {
        KryptonError::CrtcResolution(format!("no usable CRTC for encoder {}", encoder.id))
    })?;

    output.connected = true;
    output.connector = Some(connector);
    output.encoder = Some(encoder);
    output.crtc = Some(crtc);

    if crtc.mode_valid {
        info!("{} output already has mode {} programmed, keeping it", slot, crtc.mode);
        output.mode = crtc.mode;
    } else {
        info!("{} output has no valid mode, setting preferred mode", slot);
        init_mode(device, allocator, config, output)?;
    }

    Ok(DetectOutcome::Connected(output.mode))
}

/// Commit the connector's preferred mode
fn init_mode(
    device: &dyn KmsDevice,
    allocator: &dyn BufferAllocator,
    config: &DrmConfig,
    output: &mut OutputState,
) -> Result<()> {
    let mode = {
        let modes = output.connector.as_ref().map_or(&[][..], |c| &c.modes[..]);
        let index = select_mode(modes, |_| false).ok_or(KryptonError::NoModes)?;
        modes[index]
    };
    commit_mode(device, allocator, config, output, &mode)
}
