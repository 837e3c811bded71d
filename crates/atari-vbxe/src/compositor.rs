//! Scanline compositor.
//!
//! The host hands over two per-colour-clock buffers for each line: the
//! plane bits GTIA would feed its priority logic (`merge`) and the raw
//! ANTIC pixel data (`antic`), which carries luminance for hi-res and the
//! GTIA modes. The compositor resolves priority through the split tables,
//! substitutes attribute-cell colours for PF0-PF2 and writes two output
//! pixels per half-clock. Alongside, it records per half-clock which
//! planes hide the overlay, for the overlay pass that follows.

use crate::attr::{AttrLine, AttrPixel, HALF_CLOCKS};
use crate::config::CoreRevision;
use crate::memory::LocalMemory;
use crate::palette::Palettes;
use crate::priority::{self, color, plane, Resolve};
use crate::xdl::DisplayConfig;

/// Colour clocks per scanline.
pub const COLOR_CLOCKS: usize = 228;
/// Output pixels per scanline.
pub const LINE_PIXELS: usize = 912;
/// First pixel of the right border, filled at end of line.
pub const RIGHT_BORDER: usize = 888;

/// GTIA colour and priority registers mirrored by the compositor:
/// COLPM0-3, COLPF0-3, COLBK, PRIOR.
pub const GTIA_FIRST: u8 = 0x12;
pub const GTIA_REGISTERS: usize = 10;
pub const PRIOR: u8 = 0x1B;

/// Per-line inputs from the host and the display state they render with.
pub struct SpanInput<'a> {
    pub mem: &'a LocalMemory,
    pub cfg: &'a DisplayConfig,
    pub palettes: &'a Palettes,
    pub merge: &'a [u8; COLOR_CLOCKS],
    pub antic: &'a [u8; COLOR_CLOCKS],
    /// False when the host produced no playfield/player data for the line.
    pub pfpm_rendered: bool,
}

pub struct Compositor {
    /// Raw GTIA register values, $12-$1B.
    pub gtia: [u8; GTIA_REGISTERS],
    pub color_table: [u8; color::COUNT],
    pub prior: u8,
    /// ANTIC set GTIA's 40-column mode for this line.
    pub hires: bool,
    pub extended_color: bool,
    pub revision: CoreRevision,

    pub(crate) attr: AttrLine,
    pub(crate) line: Box<[u32]>,
    /// Planes hiding the overlay, per half-clock.
    pub(crate) priority: Box<[u8]>,
    /// Plane bits seen by the priority logic, per half-clock.
    pub(crate) planes: Box<[u8]>,
}

impl Compositor {
    pub fn new(revision: CoreRevision) -> Self {
        Self {
            gtia: [0; GTIA_REGISTERS],
            color_table: [0; color::COUNT],
            prior: 0,
            hires: false,
            extended_color: false,
            revision,
            attr: AttrLine::new(),
            line: vec![0; LINE_PIXELS].into_boxed_slice(),
            priority: vec![0; HALF_CLOCKS].into_boxed_slice(),
            planes: vec![0; HALF_CLOCKS].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn line(&self) -> &[u32] {
        &self.line
    }

    #[must_use]
    pub fn gtia_register(&self, reg: u8) -> Option<u8> {
        let i = reg.checked_sub(GTIA_FIRST)? as usize;
        self.gtia.get(i).copied()
    }

    #[inline]
    fn color_of(&self, c: u8) -> u8 {
        self.color_table[c as usize]
    }

    /// Apply a GTIA colour or PRIOR write. Other registers are ignored.
    pub fn write_register(&mut self, reg: u8, value: u8) {
        let Some(i) = reg.checked_sub(GTIA_FIRST).map(usize::from) else {
            return;
        };
        if i >= GTIA_REGISTERS {
            return;
        }
        self.gtia[i] = value;

        if reg == PRIOR {
            self.prior = value;
            if value & 0xC0 != 0 {
                self.hires = false;
            }
        } else {
            self.rebuild_color_table();
        }
    }

    /// Recompute the colour table, including the ORed player/playfield
    /// combinations, from the raw registers.
    pub fn rebuild_color_table(&mut self) {
        let reg = |i: usize| self.gtia[i] & 0xFE;
        let (p0, p1, p2, p3) = (reg(0), reg(1), reg(2), reg(3));
        let (pf0, pf1, pf2, pf3) = (reg(4), reg(5), reg(6), reg(7));
        let bak = reg(8);

        let ct = &mut self.color_table;
        let mut set = |c: u8, v: u8| ct[c as usize] = v;
        set(color::P0, p0);
        set(color::P1, p1);
        set(color::P2, p2);
        set(color::P3, p3);
        set(color::PF0, pf0);
        set(color::PF1, pf1);
        set(color::PF2, pf2);
        set(color::PF3, pf3);
        set(color::BAK, bak);
        set(color::BLACK, 0);
        set(color::P0P1, p0 | p1);
        set(color::P2P3, p2 | p3);
        set(color::PF0P0, pf0 | p0);
        set(color::PF0P1, pf0 | p1);
        set(color::PF0P0P1, pf0 | p0 | p1);
        set(color::PF1P0, pf1 | p0);
        set(color::PF1P1, pf1 | p1);
        set(color::PF1P0P1, pf1 | p0 | p1);
        set(color::PF2P2, pf2 | p2);
        set(color::PF2P3, pf2 | p3);
        set(color::PF2P2P3, pf2 | p2 | p3);
        set(color::PF3P2, pf3 | p2);
        set(color::PF3P3, pf3 | p3);
        set(color::PF3P2P3, pf3 | p2 | p3);
    }

    /// Cell used wherever the attribute map does not reach.
    #[must_use]
    pub fn default_cell(&self, cfg: &DisplayConfig) -> AttrPixel {
        AttrPixel {
            channels: [
                0,
                self.color_of(color::PF0),
                self.color_of(color::PF1),
                self.color_of(color::PF2),
            ],
            ctrl: (cfg.pf_palette << 6) | (cfg.ov_palette << 4),
            priority: cfg.main_priority,
            hires_promote: false,
        }
    }

    #[must_use]
    pub fn background(&self, cfg: &DisplayConfig, palettes: &Palettes) -> u32 {
        palettes.color(cfg.pf_palette, self.color_of(color::BAK))
    }

    /// Start a line: everything shows the background until rendered.
    pub fn begin_line(&mut self, cfg: &DisplayConfig, palettes: &Palettes, hires: bool) {
        self.hires = hires;
        let bak = self.background(cfg, palettes);
        self.line.fill(bak);
        self.priority.fill(0);
        self.planes.fill(0);
    }

    pub fn fill_right_border(&mut self, cfg: &DisplayConfig, palettes: &Palettes) {
        let bak = self.background(cfg, palettes);
        self.line[RIGHT_BORDER..].fill(bak);
    }

    /// Render colour clocks `[x1, x2)`.
    pub fn render_span(&mut self, input: &SpanInput<'_>, x1: usize, x2: usize) {
        let x2h = x2.min(COLOR_CLOCKS) * 2;
        let mut xh = x1 * 2;

        while xh < x2h {
            let default = self.default_cell(input.cfg);
            let xth = if input.cfg.map_enabled {
                self.attr.walk(input.mem, input.cfg, default, xh, x2h)
            } else {
                self.attr.fill(xh, x2h, default);
                x2h
            };

            let mut hires = self.hires;
            if self.attr.get(xh).reversed() {
                hires = !hires;
                let (merge, antic) = reverse_mode(input.merge, input.antic, hires, xh >> 1, (xth + 1) >> 1);
                self.render_mode(input, &merge, &antic, hires, xh, xth);
            } else {
                self.render_mode(input, input.merge, input.antic, hires, xh, xth);
            }

            xh = xth;
        }
    }

    fn render_mode(
        &mut self,
        input: &SpanInput<'_>,
        merge: &[u8; COLOR_CLOCKS],
        antic: &[u8; COLOR_CLOCKS],
        hires: bool,
        x1h: usize,
        x2h: usize,
    ) {
        let pal = input.palettes;
        match self.prior & 0xC0 {
            0x00 if hires => self.render_mode8(pal, merge, antic, x1h, x2h),
            0x00 if input.pfpm_rendered => self.render_lores(pal, merge, x1h, x2h),
            0x00 => self.render_blank(pal, x1h, x2h),
            0x40 => self.render_mode9(pal, merge, antic, x1h, x2h),
            0x80 => self.render_mode10(pal, merge, antic, x1h, x2h),
            _ => self.render_mode11(pal, merge, antic, x1h, x2h),
        }
    }

    #[inline]
    fn put(&mut self, xh: usize, rgb: u32, priority: u8, planes: u8) {
        self.line[xh * 2] = rgb;
        self.line[xh * 2 + 1] = rgb;
        self.priority[xh] = priority;
        self.planes[xh] = planes;
    }

    #[inline]
    fn resolve(&self, cell: &AttrPixel, r: Resolve) -> u8 {
        cell.channel(r.channel) | self.color_of(r.color)
    }

    fn render_lores(&mut self, pal: &Palettes, merge: &[u8; COLOR_CLOCKS], x1h: usize, x2h: usize) {
        let table = &priority::tables().split[priority::table_index(self.prior)];
        for xh in x1h..x2h {
            let i = merge[xh >> 1];
            let cell = *self.attr.get(xh);
            let c = self.resolve(&cell, table[i as usize]);
            self.put(xh, pal.color(cell.pf_palette(), c), cell.priority & i, i);
        }
    }

    /// No playfield or players on this line: background through each cell.
    fn render_blank(&mut self, pal: &Palettes, x1h: usize, x2h: usize) {
        let r = priority::tables().split[priority::table_index(self.prior)][0];
        for xh in x1h..x2h {
            let cell = *self.attr.get(xh);
            let c = self.resolve(&cell, r);
            self.put(xh, pal.color(cell.pf_palette(), c), 0, 0);
        }
    }

    /// GTIA 40-column mode: each colour clock carries two luminance bits,
    /// one per half-clock.
    fn render_mode8(
        &mut self,
        pal: &Palettes,
        merge: &[u8; COLOR_CLOCKS],
        antic: &[u8; COLOR_CLOCKS],
        x1h: usize,
        x2h: usize,
    ) {
        let table = &priority::tables().split_hires[priority::table_index(self.prior)];

        for xh in x1h..x2h {
            let cc = xh >> 1;
            let bit = if xh & 1 == 0 { 2 } else { 1 };
            let lit = antic[cc] & bit != 0;
            let cell = *self.attr.get(xh);
            let mut i = merge[cc];

            if self.extended_color {
                // Lit pixels show PF1 rather than PF2.
                if lit {
                    i -= (i & plane::PF2) >> 1;
                }
                if cell.hires_promote {
                    i += i & plane::PF2;
                }
                let c = self.resolve(&cell, table[i as usize]);
                self.put(xh, pal.color(cell.pf_palette(), c), cell.priority & i, i);
            } else {
                if cell.hires_promote {
                    i += i & plane::PF2;
                }
                let mut c = self.resolve(&cell, table[i as usize]);
                if lit {
                    c = (c & 0xF0) | (cell.channels[2] & 0x0F);
                }
                let hide = (i & !plane::PF2) | if lit { plane::PF2 } else { 0 };
                self.put(xh, pal.color(cell.pf_palette(), c), cell.priority & hide, i);
            }
        }
    }

    /// GTIA mode 9: one hue, sixteen luminances from pairs of colour clocks.
    fn render_mode9(
        &mut self,
        pal: &Palettes,
        merge: &[u8; COLOR_CLOCKS],
        antic: &[u8; COLOR_CLOCKS],
        x1h: usize,
        x2h: usize,
    ) {
        let table = &priority::tables().split[priority::table_index(self.prior)];

        for xh in x1h..x2h {
            let cc = xh >> 1;
            // Playfields are forced off; PF3 can still come from missiles.
            let i = merge[cc] & (plane::PLAYERS | plane::PF3);
            let base = cc & !1;
            let luma = if i & plane::PLAYERS == 0 {
                (antic[base] << 2).wrapping_add(antic[base + 1]) & 0x0F
            } else {
                0
            };
            let cell = *self.attr.get(xh);
            let c = self.resolve(&cell, table[i as usize]) | luma;
            self.put(xh, pal.color(cell.pf_palette(), c), cell.priority & i, i);
        }
    }

    /// GTIA mode 10: nine colours, the pixel value selecting a colour
    /// register. Player colours take part in priority as that player.
    fn render_mode10(
        &mut self,
        pal: &Palettes,
        merge: &[u8; COLOR_CLOCKS],
        antic: &[u8; COLOR_CLOCKS],
        x1h: usize,
        x2h: usize,
    ) {
        const LOOKUP: [u8; 16] = [
            plane::P0,
            plane::P1,
            plane::P2,
            plane::P3,
            plane::PF0,
            plane::PF1,
            plane::PF2,
            plane::PF3,
            0,
            0,
            0,
            0,
            plane::PF0,
            plane::PF1,
            plane::PF2,
            plane::PF3,
        ];
        let table = &priority::tables().split[priority::table_index(self.prior)];

        for xh in x1h..x2h {
            let cc = xh >> 1;
            // Mode 10 pairs are offset by one colour clock.
            let base = cc.wrapping_sub(1) & !1;
            let value = if base + 1 < COLOR_CLOCKS {
                ((antic[base] << 2).wrapping_add(antic[base + 1]) & 0x0F) as usize
            } else {
                0
            };
            let i = LOOKUP[value] | (merge[cc] & 0xF8);
            let cell = *self.attr.get(xh);
            let c = self.resolve(&cell, table[i as usize]);
            self.put(xh, pal.color(cell.pf_palette(), c), cell.priority & i, i);
        }
    }

    /// GTIA mode 11: sixteen hues at one luminance. Zero chroma also
    /// clears the luminance of the background.
    fn render_mode11(
        &mut self,
        pal: &Palettes,
        merge: &[u8; COLOR_CLOCKS],
        antic: &[u8; COLOR_CLOCKS],
        x1h: usize,
        x2h: usize,
    ) {
        let table = &priority::tables().split[priority::table_index(self.prior)];
        let keep_pf3 = self.revision.keeps_pf3_luma_at_zero_chroma();

        for xh in x1h..x2h {
            let cc = xh >> 1;
            let i = merge[cc] & (plane::PLAYERS | plane::PF3);
            let base = cc & !1;
            let chroma = (antic[base] << 6).wrapping_add(antic[base + 1] << 4);

            let (or_mask, and_mask) = if i & plane::PLAYERS != 0 {
                (0x00, 0xFF)
            } else if chroma != 0 || (keep_pf3 && i & plane::PF3 != 0) {
                (0xFF, 0xFF)
            } else {
                (0xFF, 0xF0)
            };

            let cell = *self.attr.get(xh);
            let c = (self.resolve(&cell, table[i as usize]) | (chroma & or_mask)) & and_mask;
            self.put(xh, pal.color(cell.pf_palette(), c), cell.priority & i, i);
        }
    }
}

/// Reinterpret colour clocks `[x1, x2)` in the opposite resolution for
/// cells with the mode-reversal bit set.
fn reverse_mode(
    merge: &[u8; COLOR_CLOCKS],
    antic: &[u8; COLOR_CLOCKS],
    to_hires: bool,
    x1: usize,
    x2: usize,
) -> ([u8; COLOR_CLOCKS], [u8; COLOR_CLOCKS]) {
    let mut m = *merge;
    let mut a = *antic;
    let x2 = x2.min(COLOR_CLOCKS);

    if to_hires {
        // Playfield bits become a luminance pattern over PF2.
        const LUMA: [u8; 8] = [0, 1, 2, 2, 3, 3, 3, 3];
        for x in x1..x2 {
            a[x] = LUMA[(merge[x] & 7) as usize];
            m[x] = (merge[x] & plane::PLAYERS) | plane::PF2;
        }
    } else {
        // The two hi-res bits select a playfield directly.
        for x in x1..x2 {
            let d = merge[x];
            if d & plane::PF2 != 0 {
                m[x] = (d & !plane::PF) | (1 << (antic[x] & 3));
            }
        }
    }
    (m, a)
}
