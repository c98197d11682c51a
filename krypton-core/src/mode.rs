//! Display modes and mode selection
//!
//! `ModeInfo` carries the same timing fields as the kernel's
//! `drm_mode_modeinfo`, as an owned value the manager can compare and copy.

use serde::Serialize;

/// Mode type bit the kernel sets on the EDID-preferred mode
pub const MODE_TYPE_PREFERRED: u32 = 1 << 3;

/// Mode flag bits (`DRM_MODE_FLAG_*`)
pub const MODE_FLAG_PHSYNC: u32 = 1 << 0;
pub const MODE_FLAG_NHSYNC: u32 = 1 << 1;
pub const MODE_FLAG_PVSYNC: u32 = 1 << 2;
pub const MODE_FLAG_NVSYNC: u32 = 1 << 3;
pub const MODE_FLAG_INTERLACE: u32 = 1 << 4;

const MODE_NAME_LEN: usize = 32;

/// A resolution/refresh/timing tuple supported by a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub mode_type: u32,
    #[serde(skip_serializing)]
    pub name: [u8; MODE_NAME_LEN],
}

impl ModeInfo {
    /// Build a mode with only the fields used for matching filled in
    pub fn new(width: u16, height: u16, refresh: u32) -> Self {
        let mut mode = Self {
            hdisplay: width,
            vdisplay: height,
            vrefresh: refresh,
            ..Self::default()
        };
        mode.set_name(&format!("{}x{}", width, height));
        mode
    }

    /// Mark this mode as the connector's preferred one
    pub fn preferred(mut self) -> Self {
        self.mode_type |= MODE_TYPE_PREFERRED;
        self
    }

    /// Set timing flags
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn width(&self) -> u32 {
        u32::from(self.hdisplay)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.vdisplay)
    }

    pub fn is_preferred(&self) -> bool {
        self.mode_type & MODE_TYPE_PREFERRED != 0
    }

    /// A zero-sized mode means nothing has been committed
    pub fn is_empty(&self) -> bool {
        self.hdisplay == 0 || self.vdisplay == 0
    }

    /// Mode name as reported by the kernel
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(MODE_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; MODE_NAME_LEN];
        let len = name.len().min(MODE_NAME_LEN - 1);
        self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    /// Whether `self`, as a request, is already satisfied by `base`.
    ///
    /// Resolution and refresh must be equal; the requested flags only need to
    /// be a subset of the base flags.
    pub fn matches(&self, base: &ModeInfo) -> bool {
        base.hdisplay == self.hdisplay
            && base.vdisplay == self.vdisplay
            && base.vrefresh == self.vrefresh
            && (base.flags & self.flags) == self.flags
    }
}

impl std::fmt::Display for ModeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}Hz", self.hdisplay, self.vdisplay, self.vrefresh)
    }
}

/// Pick a mode from a connector's list.
///
/// The first mode accepted by `exact` wins. Otherwise the last mode flagged
/// preferred is used, or index 0 when none is. Returns `None` only for an
/// empty list.
pub fn select_mode<F>(modes: &[ModeInfo], mut exact: F) -> Option<usize>
where
    F: FnMut(&ModeInfo) -> bool,
{
    if modes.is_empty() {
        return None;
    }

    let mut index = 0;
    for (i, mode) in modes.iter().enumerate() {
        if mode.is_preferred() {
            index = i;
        }
        if exact(mode) {
            return Some(i);
        }
    }
    Some(index)
}

/// A user-facing mode request, parsed from `WIDTHxHEIGHT[@REFRESH]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeRequest {
    pub width: u16,
    pub height: u16,
    pub refresh: Option<u32>,
}

impl ModeRequest {
    /// Whether a connector mode satisfies this request
    pub fn accepts(&self, mode: &ModeInfo) -> bool {
        mode.hdisplay == self.width
            && mode.vdisplay == self.height
            && self.refresh.is_none_or(|hz| mode.vrefresh == hz)
    }
}

impl std::str::FromStr for ModeRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (res, refresh) = match s.split_once('@') {
            Some((res, hz)) => {
                let hz = hz
                    .trim_end_matches("Hz")
                    .trim_end_matches("hz")
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid refresh rate: {}", hz))?;
                (res, Some(hz))
            }
            None => (s, None),
        };

        let (w, h) = res
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid mode (expected WIDTHxHEIGHT[@HZ]): {}", s))?;
        let width = w.parse().map_err(|_| format!("Invalid width: {}", w))?;
        let height = h.parse().map_err(|_| format!("Invalid height: {}", h))?;

        Ok(Self {
            width,
            height,
            refresh,
        })
    }
}

impl std::fmt::Display for ModeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.refresh {
            Some(hz) => write!(f, "{}x{}@{}", self.width, self.height, hz),
            None => write!(f, "{}x{}", self.width, self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tie_break_list() -> Vec<ModeInfo> {
        vec![
            ModeInfo::new(1920, 1080, 60),
            ModeInfo::new(1920, 1080, 60).preferred(),
            ModeInfo::new(1280, 720, 30),
        ]
    }

    #[test]
    fn test_select_prefers_preferred_without_request() {
        assert_eq!(select_mode(&tie_break_list(), |_| false), Some(1));
    }

    #[test]
    fn test_select_exact_match_wins() {
        let request = ModeInfo::new(1280, 720, 30);
        assert_eq!(select_mode(&tie_break_list(), |m| request.matches(m)), Some(2));
    }

    #[test]
    fn test_select_first_exact_match_stops_search() {
        let request = ModeInfo::new(1920, 1080, 60);
        assert_eq!(select_mode(&tie_break_list(), |m| request.matches(m)), Some(0));
    }

    #[test]
    fn test_select_uses_last_preferred() {
        let modes = vec![
            ModeInfo::new(800, 600, 60).preferred(),
            ModeInfo::new(1024, 768, 60),
            ModeInfo::new(1280, 1024, 60).preferred(),
        ];
        assert_eq!(select_mode(&modes, |_| false), Some(2));
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let modes = vec![ModeInfo::new(800, 600, 60), ModeInfo::new(1024, 768, 60)];
        assert_eq!(select_mode(&modes, |_| false), Some(0));
        assert_eq!(select_mode(&[], |_| true), None);
    }

    #[test]
    fn test_flags_subset_is_equivalent() {
        let current = ModeInfo::new(1920, 1080, 60).with_flags(MODE_FLAG_PHSYNC | MODE_FLAG_PVSYNC);
        let relaxed = ModeInfo::new(1920, 1080, 60).with_flags(MODE_FLAG_PHSYNC);
        assert!(relaxed.matches(&current));
        assert!(!current.matches(&relaxed));
    }

    #[test]
    fn test_empty_mode_never_matches() {
        assert!(!ModeInfo::new(1920, 1080, 60).matches(&ModeInfo::default()));
        assert!(ModeInfo::default().is_empty());
    }

    #[test]
    fn test_mode_name() {
        let mode = ModeInfo::new(2560, 1440, 144);
        assert_eq!(mode.name(), "2560x1440");
        assert_eq!(mode.to_string(), "2560x1440@144Hz");
    }

    #[test]
    fn test_parse_mode_request() {
        let req: ModeRequest = "1920x1080@60".parse().unwrap();
        assert_eq!(req.width, 1920);
        assert_eq!(req.height, 1080);
        assert_eq!(req.refresh, Some(60));

        let req: ModeRequest = "1280x720".parse().unwrap();
        assert_eq!(req.refresh, None);
        assert!(req.accepts(&ModeInfo::new(1280, 720, 30)));

        assert!("1080p".parse::<ModeRequest>().is_err());
        assert!("1920x1080@fast".parse::<ModeRequest>().is_err());
    }
}
