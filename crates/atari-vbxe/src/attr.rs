//! Attribute map walker.
//!
//! The attribute map is a grid of 4-byte cells: PF0, PF1 and PF2 colours,
//! then a control byte. Cells are `map_width` half-clocks wide, scrolled by
//! `map_hscroll`, and only cover the overlay window; outside it every
//! half-clock gets the default cell built from the GTIA colours.

use crate::memory::{self, LocalMemory};
use crate::xdl::DisplayConfig;

/// Half colour clocks on a scanline.
pub const HALF_CLOCKS: usize = 456;

/// Attribute control byte: playfield/overlay palette in bits 6-7 and 4-5,
/// mode reversal in bit 2, priority band in bits 0-1.
pub const ATTR_REVERSE: u8 = 0x04;
pub const ATTR_LORES_WIDTH: u8 = 0x08;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrPixel {
    /// Indexed by priority channel: 0 is always zero, 1-3 are PF0-PF2.
    pub channels: [u8; 4],
    pub ctrl: u8,
    /// Overlay priority mask for this cell, internal layout.
    pub priority: u8,
    /// Turns unlit PF2 into PF3 in extended-colour hi-res.
    pub hires_promote: bool,
}

impl AttrPixel {
    #[inline]
    #[must_use]
    pub const fn channel(&self, ch: u8) -> u8 {
        self.channels[(ch & 3) as usize]
    }

    #[inline]
    #[must_use]
    pub const fn pf_palette(&self) -> u8 {
        self.ctrl >> 6
    }

    #[inline]
    #[must_use]
    pub const fn ov_palette(&self) -> u8 {
        (self.ctrl >> 4) & 3
    }

    #[inline]
    #[must_use]
    pub const fn reversed(&self) -> bool {
        self.ctrl & ATTR_REVERSE != 0
    }

    /// Low-resolution width bit. Carried with the cell; the renderers
    /// ignore it.
    #[inline]
    #[must_use]
    pub const fn lores_width(&self) -> bool {
        self.ctrl & ATTR_LORES_WIDTH != 0
    }
}

/// One line of decoded attribute cells, one per half-clock.
pub struct AttrLine {
    cells: Box<[AttrPixel]>,
}

impl AttrLine {
    pub fn new() -> Self {
        Self {
            cells: vec![AttrPixel::default(); HALF_CLOCKS].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, xh: usize) -> &AttrPixel {
        &self.cells[xh]
    }

    pub fn fill(&mut self, x1h: usize, x2h: usize, cell: AttrPixel) {
        self.cells[x1h..x2h].fill(cell);
    }

    /// Decode cells for `[x1h, x2h)`.
    ///
    /// Returns where the decoded run ends. That is `x2h` unless the
    /// mode-reversal bit changes first; the caller renders up to the
    /// returned position and walks again from there.
    pub fn walk(
        &mut self,
        mem: &LocalMemory,
        cfg: &DisplayConfig,
        default: AttrPixel,
        x1h: usize,
        x2h: usize,
    ) -> usize {
        let (l, r) = cfg.overlay_width.bounds();
        let (xl, xr) = (l * 2, r * 2);

        if x2h <= xl || x1h >= xr {
            self.fill(x1h, x2h, default);
            return x2h;
        }

        let start = x1h.max(xl);
        let end = x2h.min(xr);
        let width = cfg.map_width.max(1);
        let shift: u32 = if width > 16 {
            2
        } else if width > 8 {
            1
        } else {
            0
        };

        let pos = (start - xl) as u32 + cfg.map_hscroll;
        let mut offset = pos % width;
        let mut addr = memory::wrap(cfg.map_address + pos / width * 4);
        let mut cell = read_cell(mem, addr, cfg);

        let reversed = if x1h < xl {
            self.fill(x1h, xl, default);
            if cell.reversed() != default.reversed() {
                return xl;
            }
            default.reversed()
        } else {
            cell.reversed()
        };

        let mut x = start;
        while x < end {
            cell.hires_promote = (cell.channels[1] << (offset >> shift)) & 0x80 != 0;
            self.cells[x] = cell;
            x += 1;

            offset += 1;
            if offset >= width {
                offset = 0;
                addr = memory::wrap(addr + 4);
                cell = read_cell(mem, addr, cfg);
                if x < end && cell.reversed() != reversed {
                    return x;
                }
            }
        }

        if end < x2h {
            if default.reversed() != reversed {
                return end;
            }
            self.fill(end, x2h, default);
        }
        x2h
    }
}

impl Default for AttrLine {
    fn default() -> Self {
        Self::new()
    }
}

fn read_cell(mem: &LocalMemory, addr: u32, cfg: &DisplayConfig) -> AttrPixel {
    let [pf0, pf1, pf2, ctrl] = mem.read_array::<4>(addr);
    AttrPixel {
        channels: [0, pf0, pf1, pf2],
        ctrl,
        priority: cfg.band_priority[(ctrl & 3) as usize],
        hires_promote: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdl::OverlayWidth;

    fn map_config(addr: u32, width: u32) -> DisplayConfig {
        DisplayConfig {
            map_enabled: true,
            map_address: addr,
            map_width: width,
            overlay_width: OverlayWidth::Normal,
            band_priority: [0x11, 0x22, 0x44, 0x88],
            ..DisplayConfig::new()
        }
    }

    fn default_cell() -> AttrPixel {
        AttrPixel {
            channels: [0, 0x20, 0x30, 0x40],
            ctrl: 0x10,
            priority: 0xFF,
            hires_promote: false,
        }
    }

    #[test]
    fn borders_get_the_default_cell() {
        let mem = LocalMemory::new();
        let cfg = map_config(0x1000, 8);
        let mut line = AttrLine::new();
        let end = line.walk(&mem, &cfg, default_cell(), 0, HALF_CLOCKS);
        assert_eq!(end, HALF_CLOCKS);
        assert_eq!(*line.get(0), default_cell());
        assert_eq!(*line.get(95), default_cell());
        assert_eq!(line.get(96).ctrl, 0, "first map cell");
        assert_eq!(*line.get(416), default_cell());
    }

    #[test]
    fn cells_step_every_map_width_half_clocks() {
        let mut mem = LocalMemory::new();
        mem.load(0x1000, &[1, 2, 3, 0x01, 4, 5, 6, 0x02]);
        let cfg = map_config(0x1000, 8);
        let mut line = AttrLine::new();
        line.walk(&mem, &cfg, default_cell(), 96, 120);

        let a = line.get(96);
        assert_eq!(a.channels, [0, 1, 2, 3]);
        assert_eq!(a.priority, 0x22);
        assert_eq!(*line.get(103), *a);
        let b = line.get(104);
        assert_eq!(b.channels, [0, 4, 5, 6]);
        assert_eq!(b.priority, 0x44);
    }

    #[test]
    fn hscroll_shifts_cell_boundaries() {
        let mut mem = LocalMemory::new();
        mem.load(0x1000, &[1, 0, 0, 0, 2, 0, 0, 0]);
        let cfg = DisplayConfig {
            map_hscroll: 6,
            ..map_config(0x1000, 8)
        };
        let mut line = AttrLine::new();
        line.walk(&mem, &cfg, default_cell(), 96, 120);
        assert_eq!(line.get(97).channels[1], 1);
        assert_eq!(line.get(98).channels[1], 2, "only two half-clocks left of the first cell");
    }

    #[test]
    fn promote_flag_reads_pf0_bits_msb_first() {
        let mut mem = LocalMemory::new();
        mem.load(0x1000, &[0b1010_0000, 0, 0, 0]);
        let cfg = map_config(0x1000, 8);
        let mut line = AttrLine::new();
        line.walk(&mem, &cfg, default_cell(), 96, 104);
        let flags: Vec<bool> = (96..104).map(|x| line.get(x).hires_promote).collect();
        assert_eq!(flags, [true, false, true, false, false, false, false, false]);
    }

    #[test]
    fn wide_cells_share_promote_bits() {
        let mut mem = LocalMemory::new();
        mem.load(0x1000, &[0b1000_0000, 0, 0, 0]);
        let cfg = map_config(0x1000, 16);
        let mut line = AttrLine::new();
        line.walk(&mem, &cfg, default_cell(), 96, 112);
        assert!(line.get(96).hires_promote);
        assert!(line.get(97).hires_promote);
        assert!(!line.get(98).hires_promote);
    }

    #[test]
    fn reversal_change_splits_the_walk() {
        let mut mem = LocalMemory::new();
        mem.load(0x1000, &[0, 0, 0, 0x00, 0, 0, 0, ATTR_REVERSE, 0, 0, 0, ATTR_REVERSE]);
        let cfg = map_config(0x1000, 8);
        let mut line = AttrLine::new();

        let end = line.walk(&mem, &cfg, default_cell(), 96, 120);
        assert_eq!(end, 104, "stops where the reversed cell starts");
        let end = line.walk(&mem, &cfg, default_cell(), end, 120);
        assert_eq!(end, 120, "two reversed cells form one run");
        assert!(line.get(104).reversed());
        assert!(line.get(119).reversed());
    }

    #[test]
    fn reversed_first_cell_splits_at_the_window_edge() {
        let mut mem = LocalMemory::new();
        mem.load(0x1000, &[0, 0, 0, ATTR_REVERSE]);
        let cfg = map_config(0x1000, 8);
        let mut line = AttrLine::new();
        assert_eq!(line.walk(&mem, &cfg, default_cell(), 0, 200), 96);
    }
}
