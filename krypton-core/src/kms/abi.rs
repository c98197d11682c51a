//! Driver-private ioctl numbering (`DRM_COMMAND_BASE` range of `drm.h`)

const DRM_IOCTL_BASE: u32 = b'd' as u32;

/// First ioctl number reserved for driver-private commands
pub const DRM_COMMAND_BASE: u32 = 0x40;
/// One past the last driver-private command number
pub const DRM_COMMAND_END: u32 = 0xa0;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;
const IOC_SIZEMASK: u32 = 0x3fff;

/// Largest payload the ioctl size field can describe
pub const MAX_PAYLOAD: usize = IOC_SIZEMASK as usize;

const fn ioc(dir: u32, nr: u32, size: u32) -> u32 {
    (dir << 30) | ((size & IOC_SIZEMASK) << 16) | (DRM_IOCTL_BASE << 8) | nr
}

/// `_IOW('d', nr, size)`
pub const fn iow(nr: u32, size: usize) -> u32 {
    ioc(IOC_WRITE, nr, size as u32)
}

/// `_IOWR('d', nr, size)`
pub const fn iowr(nr: u32, size: usize) -> u32 {
    ioc(IOC_READ | IOC_WRITE, nr, size as u32)
}
