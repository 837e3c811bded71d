//! Overlay plane.
//!
//! The overlay is fetched and decoded at four pixels per colour clock into
//! a line buffer, then laid over the compositor output wherever no plane
//! with priority covers it. Text mode keeps a second buffer saying which
//! decoded pixels are glyph foreground.

use serde::{Deserialize, Serialize};

use crate::compositor::{Compositor, LINE_PIXELS};
use crate::memory::{self, LocalMemory};
use crate::palette::Palettes;
use crate::xdl::{DisplayConfig, OverlayMode};

/// Background index for non-inverse text in opaque mode.
const TEXT_BACKGROUND: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayFlags {
    /// Index 0 shows through (VIDEO_CONTROL bit 2 clear).
    pub transparent: bool,
    /// Colours with all four low bits set also show through.
    pub transparent_15: bool,
}

impl Default for OverlayFlags {
    fn default() -> Self {
        Self {
            transparent: true,
            transparent_15: false,
        }
    }
}

pub struct Overlay {
    pub flags: OverlayFlags,
    pub collision_mask: u8,
    /// Sticky until COLCLR.
    pub collision_state: u8,
    decode: Box<[u8]>,
    text_mask: Box<[u8]>,
}

impl Overlay {
    pub fn new() -> Self {
        Self {
            flags: OverlayFlags::default(),
            collision_mask: 0,
            collision_state: 0,
            decode: vec![0; LINE_PIXELS].into_boxed_slice(),
            text_mask: vec![0; LINE_PIXELS].into_boxed_slice(),
        }
    }

    /// Fetch, decode and composite colour clocks `[x1, x2)`.
    pub fn render(
        &mut self,
        mem: &LocalMemory,
        cfg: &DisplayConfig,
        palettes: &Palettes,
        comp: &mut Compositor,
        x1: usize,
        x2: usize,
    ) {
        if cfg.overlay_mode == OverlayMode::Disabled {
            return;
        }

        let (xl, xr) = cfg.overlay_width.bounds();
        let hscroll = if cfg.overlay_mode == OverlayMode::Text {
            usize::from(cfg.overlay_hscroll & 7)
        } else {
            0
        };

        // Scrolled text needs two colour clocks of lookahead.
        let lead = if hscroll != 0 { 2 } else { 0 };
        let f1 = (x1 + lead).max(xl);
        let f2 = (x2 + lead).min(xr + lead);
        for cc in f1..f2 {
            self.decode_clock(mem, cfg, cc, cc - xl);
        }

        let c1 = x1.max(xl);
        let c2 = x2.min(xr);
        for xh in c1 * 2..c2 * 2 {
            let cell = *comp.attr.get(xh);
            let hidden = comp.priority[xh] != 0;
            let planes = comp.planes[xh];

            for k in 0..2 {
                let src = xh * 2 + hscroll + k;
                let v = self.decode[src];
                if !self.is_opaque(cfg.overlay_mode, v, self.text_mask[src]) {
                    continue;
                }
                self.collision_state |= planes & self.collision_mask;
                if !hidden {
                    comp.line[xh * 2 + k] = palettes.color(cell.ov_palette(), v);
                }
            }
        }
    }

    fn is_opaque(&self, mode: OverlayMode, v: u8, text_mask: u8) -> bool {
        if !self.flags.transparent {
            return true;
        }
        let shown = if mode == OverlayMode::Text {
            text_mask != 0
        } else {
            v != 0
        };
        shown && !(self.flags.transparent_15 && v & 0x0F == 0x0F)
    }

    /// Decode the four pixels of colour clock `cc`, `rel` clocks into the
    /// overlay window.
    fn decode_clock(&mut self, mem: &LocalMemory, cfg: &DisplayConfig, cc: usize, rel: usize) {
        let base = cfg.overlay_address;
        let rel = rel as u32;
        let out = cc * 4;

        let pixels: [u8; 4] = match cfg.overlay_mode {
            OverlayMode::Disabled => return,
            OverlayMode::LowRes => [mem.read(base + rel); 4],
            OverlayMode::StandardRes => {
                let [b0, b1] = mem.read_array::<2>(base + rel * 2);
                [b0, b0, b1, b1]
            }
            OverlayMode::HighRes => {
                let [b0, b1] = mem.read_array::<2>(base + rel * 2);
                [b0 >> 4, b0 & 0x0F, b1 >> 4, b1 & 0x0F]
            }
            OverlayMode::Text => {
                let (pixels, mask) = text_clock(mem, cfg, rel);
                self.text_mask[out..out + 4].copy_from_slice(&mask);
                pixels
            }
        };
        self.decode[out..out + 4].copy_from_slice(&pixels);
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Half a character: cells are two bytes (code, attribute) covering two
/// colour clocks, one glyph nibble each, MSB first.
fn text_clock(mem: &LocalMemory, cfg: &DisplayConfig, rel: u32) -> ([u8; 4], [u8; 4]) {
    let cell = memory::wrap(cfg.overlay_address + (rel & !1));
    let [ch, attr] = mem.read_array::<2>(cell);
    let glyph = mem.read(cfg.charset_address + u32::from(cfg.text_row & 7) + u32::from(ch) * 8);
    let bits = if rel & 1 == 0 { glyph >> 4 } else { glyph & 0x0F };

    let fg = attr & 0x7F;
    let inverse = attr & 0x80 != 0;
    let mut pixels = [0u8; 4];
    let mut mask = [0u8; 4];

    for k in 0..4 {
        let set = bits & (8 >> k) != 0;
        pixels[k] = match (set, inverse) {
            (true, _) => fg,
            (false, true) => fg | 0x80,
            (false, false) => TEXT_BACKGROUND,
        };
        // Inverse cells cover their whole area.
        mask[k] = if set || inverse { 0xFF } else { 0 };
    }
    (pixels, mask)
}
