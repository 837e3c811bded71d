//! Board configuration.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// FX core firmware revision.
///
/// The two cores disagree on the layout of the overlay priority bytes and
/// on one GTIA mode 11 corner case, so software written against one can
/// render differently on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoreRevision {
    /// FX 1.24: priority bytes are stored with their nibbles swapped.
    Fx124,
    /// FX 1.26: priority bytes are stored in plane-bit order.
    #[default]
    Fx126,
}

impl CoreRevision {
    /// Value read back from MINOR_REVISION.
    #[must_use]
    pub const fn minor_revision(self) -> u8 {
        match self {
            Self::Fx124 => 0x24,
            Self::Fx126 => 0x26,
        }
    }

    /// Convert a priority byte as written by the CPU into the internal
    /// layout: one bit per plane, set where that plane hides the overlay.
    #[must_use]
    pub const fn priority_to_native(self, raw: u8) -> u8 {
        let inv = !raw;
        match self {
            Self::Fx124 => inv.rotate_left(4),
            Self::Fx126 => inv,
        }
    }

    /// Inverse of [`priority_to_native`](Self::priority_to_native).
    #[must_use]
    pub const fn priority_from_native(self, native: u8) -> u8 {
        match self {
            Self::Fx124 => !native.rotate_left(4),
            Self::Fx126 => !native,
        }
    }

    /// In GTIA mode 11 a bare PF3 pixel at zero chroma has its luminance
    /// forced to zero on FX 1.24 and passed through on FX 1.26.
    #[must_use]
    pub const fn keeps_pf3_luma_at_zero_chroma(self) -> bool {
        matches!(self, Self::Fx126)
    }
}

#[derive(Debug, Clone)]
pub struct VbxeConfig {
    pub revision: CoreRevision,
    /// Page holding the VBXE registers: $D6 or $D7.
    pub register_page: u8,
    /// Atari 5200 board layout: MEMAC A fixed at $D800-$E7FF, no window B.
    pub mode_5200: bool,
    /// Local memory is the machine's extended RAM and is saved by the
    /// machine rather than in VBXE snapshots.
    pub shared_memory: bool,
    /// Log every blit control block as it is loaded.
    pub log_blits: bool,
}

impl VbxeConfig {
    pub fn new() -> Self {
        Self {
            revision: CoreRevision::default(),
            register_page: 0xD6,
            mode_5200: false,
            shared_memory: false,
            log_blits: log_blits_from_env(),
        }
    }
}

impl Default for VbxeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `VBXE_LOG_BLITS` turns on blit logging without a rebuild.
fn log_blits_from_env() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("VBXE_LOG_BLITS").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fx124_swaps_nibbles_after_inverting() {
        // Overlay above P0 only (raw bit 0) on FX 1.24 means every plane
        // except P0 hides the overlay.
        let native = CoreRevision::Fx124.priority_to_native(0x01);
        assert_eq!(native, 0xEF);
    }

    #[test]
    fn fx126_only_inverts() {
        let native = CoreRevision::Fx126.priority_to_native(0x01);
        assert_eq!(native, 0xFE);
    }

    #[test]
    fn priority_layouts_round_trip() {
        for rev in [CoreRevision::Fx124, CoreRevision::Fx126] {
            for raw in [0x00, 0x0F, 0x5A, 0xF0, 0xFF] {
                assert_eq!(rev.priority_from_native(rev.priority_to_native(raw)), raw);
            }
        }
    }

    #[test]
    fn minor_revision_tracks_core() {
        assert_eq!(CoreRevision::Fx124.minor_revision(), 0x24);
        assert_eq!(CoreRevision::Fx126.minor_revision(), 0x26);
    }
}
