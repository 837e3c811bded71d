//! XDL - the extended display list.
//!
//! Once per scanline the XDL processor either counts down the current
//! record's repeat or fetches the next record. A record is a 16-bit control
//! word followed by the optional fields the control bits ask for, so a
//! record can never be malformed; it can only describe a useless screen.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CoreRevision;
use crate::memory::{self, LocalMemory};

/// Lines of per-frame history kept for inspection; also the longest a
/// display list may run before it is forcibly stopped.
pub const XDL_HISTORY_LINES: usize = 240;

// Control word bits. The low byte is fetched first.
pub const XDLC_TMON: u16 = 0x0001;
pub const XDLC_GMON: u16 = 0x0002;
pub const XDLC_OVOFF: u16 = 0x0004;
pub const XDLC_MAPON: u16 = 0x0008;
pub const XDLC_MAPOFF: u16 = 0x0010;
pub const XDLC_RPTL: u16 = 0x0020;
pub const XDLC_OVADR: u16 = 0x0040;
pub const XDLC_OVSCRL: u16 = 0x0080;
pub const XDLC_CHBASE: u16 = 0x0100;
pub const XDLC_MAPADR: u16 = 0x0200;
pub const XDLC_MAPPAR: u16 = 0x0400;
pub const XDLC_ATT: u16 = 0x0800;
pub const XDLC_HR: u16 = 0x1000;
pub const XDLC_LR: u16 = 0x2000;
pub const XDLC_END: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayMode {
    #[default]
    Disabled,
    LowRes,
    StandardRes,
    HighRes,
    Text,
}

impl OverlayMode {
    /// Mode selected by TMON/GMON together with HR/LR.
    fn from_control(control: u16) -> Self {
        match (control & 3, (control >> 12) & 3) {
            (1, _) => Self::Text,
            (2, 0) => Self::StandardRes,
            (2, 1) => Self::HighRes,
            (2, 2) => Self::LowRes,
            _ => Self::Disabled,
        }
    }

    /// Overlay fetch cost for one line, in DMA units.
    #[must_use]
    pub const fn fetch_cost(self, width: OverlayWidth) -> u32 {
        const COST: [[u32; 3]; 5] = [
            [0, 0, 0],
            [128, 160, 168],
            [256, 320, 336],
            [256, 320, 336],
            [195, 243, 255],
        ];
        COST[self as usize][width as usize]
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "off",
            Self::LowRes => "lr",
            Self::StandardRes => "sr",
            Self::HighRes => "hr",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayWidth {
    Narrow,
    #[default]
    Normal,
    Wide,
}

impl OverlayWidth {
    const fn from_ctl(ctl: u8) -> Self {
        match ctl & 3 {
            0 => Self::Narrow,
            1 => Self::Normal,
            _ => Self::Wide,
        }
    }

    /// Visible overlay window in colour clocks, `[left, right)`.
    #[must_use]
    pub const fn bounds(self) -> (usize, usize) {
        match self {
            Self::Narrow => (64, 192),
            Self::Normal => (48, 208),
            Self::Wide => (44, 212),
        }
    }

    /// Width of the window in overlay pixels at standard resolution.
    #[must_use]
    pub const fn pixels(self) -> u32 {
        match self {
            Self::Narrow => 256,
            Self::Normal => 320,
            Self::Wide => 336,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGeometry {
    pub hscroll: u8,
    pub vscroll: u8,
    pub width: u8,
    pub height: u8,
}

impl MapGeometry {
    fn from_raw(raw: [u8; 4]) -> Self {
        Self {
            hscroll: raw[0] & 0x1F,
            vscroll: raw[1] & 0x1F,
            // Cells narrower than 8 pixels are not supported by the FX core.
            width: ((raw[2] & 31) + 1).max(8),
            height: (raw[3] & 31) + 1,
        }
    }
}

/// One display-list record as it sits in local memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdlRecord {
    pub address: u32,
    pub control: u16,
    /// Bytes fetched, control word included.
    pub len: u32,
    pub repeat: Option<u8>,
    pub overlay: Option<(u32, u32)>,
    pub overlay_scroll: Option<(u8, u8)>,
    pub charset: Option<u8>,
    pub map: Option<(u32, u32)>,
    pub map_geometry: Option<MapGeometry>,
    /// Raw ATT bytes: control (width and palettes) and main priority.
    pub attributes: Option<(u8, u8)>,
}

impl XdlRecord {
    #[must_use]
    pub fn decode(mem: &LocalMemory, address: u32) -> Self {
        let mut addr = memory::wrap(address);
        let mut fetch = || {
            let b = mem.read(addr);
            addr = memory::wrap(addr + 1);
            b
        };

        let control = u16::from_le_bytes([fetch(), fetch()]);
        let mut rec = Self {
            address: memory::wrap(address),
            control,
            len: 0,
            repeat: None,
            overlay: None,
            overlay_scroll: None,
            charset: None,
            map: None,
            map_geometry: None,
            attributes: None,
        };

        if control & XDLC_RPTL != 0 {
            rec.repeat = Some(fetch());
        }
        if control & XDLC_OVADR != 0 {
            let raw = [fetch(), fetch(), fetch(), fetch(), fetch()];
            rec.overlay = Some(address_and_step(raw));
        }
        if control & XDLC_OVSCRL != 0 {
            rec.overlay_scroll = Some((fetch() & 7, fetch() & 7));
        }
        if control & XDLC_CHBASE != 0 {
            rec.charset = Some(fetch());
        }
        if control & XDLC_MAPADR != 0 {
            let raw = [fetch(), fetch(), fetch(), fetch(), fetch()];
            rec.map = Some(address_and_step(raw));
        }
        if control & XDLC_MAPPAR != 0 {
            rec.map_geometry = Some(MapGeometry::from_raw([fetch(), fetch(), fetch(), fetch()]));
        }
        if control & XDLC_ATT != 0 {
            rec.attributes = Some((fetch(), fetch()));
        }

        rec.len = addr.wrapping_sub(rec.address) & memory::ADDRESS_MASK;
        rec
    }

    /// `Some(mode)` if this record changes the overlay mode.
    #[must_use]
    pub fn overlay_mode(&self) -> Option<OverlayMode> {
        if self.control & XDLC_OVOFF != 0 {
            Some(OverlayMode::Disabled)
        } else if self.control & 3 != 0 {
            Some(OverlayMode::from_control(self.control))
        } else {
            None
        }
    }

    /// `Some(enabled)` if this record switches the attribute map.
    #[must_use]
    pub fn map_switch(&self) -> Option<bool> {
        if self.control & XDLC_MAPOFF != 0 {
            Some(false)
        } else if self.control & XDLC_MAPON != 0 {
            Some(true)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        self.control & XDLC_END != 0
    }

    /// Scanlines this record covers.
    #[must_use]
    pub fn lines(&self) -> u32 {
        self.repeat.map_or(1, |r| u32::from(r) + 1)
    }
}

fn address_and_step(raw: [u8; 5]) -> (u32, u32) {
    let addr = u32::from_le_bytes([raw[0], raw[1], raw[2], 0]) & memory::ADDRESS_MASK;
    let step = u32::from(u16::from_le_bytes([raw[3], raw[4]])) & 0xFFF;
    (addr, step)
}

impl fmt::Display for XdlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self.overlay_mode().map_or("same", OverlayMode::name);
        write!(f, "{:05X}: {:04X}  mode {mode}", self.address, self.control)?;
        match self.map_switch() {
            Some(true) => write!(f, ", map_on")?,
            Some(false) => write!(f, ", map_off")?,
            None => {}
        }
        if let Some(r) = self.repeat {
            write!(f, ", repeat {}", u32::from(r) + 1)?;
        }
        if let Some((addr, step)) = self.overlay {
            write!(f, ", load_ovl ${addr:05X},${step:03X}")?;
        }
        if let Some((h, v)) = self.overlay_scroll {
            write!(f, ", ovscroll {h},{v}")?;
        }
        if let Some(ch) = self.charset {
            write!(f, ", load_chbase ${:05X}", u32::from(ch) << 11)?;
        }
        if let Some((addr, step)) = self.map {
            write!(f, ", load_map ${addr:05X},${step:03X}")?;
        }
        if let Some(g) = self.map_geometry {
            write!(
                f,
                ", map_attr {},{},{}x{}",
                g.hscroll, g.vscroll, g.width, g.height
            )?;
        }
        if let Some((ctl, pri)) = self.attributes {
            write!(f, ", attr ${ctl:02X},${pri:02X}")?;
        }
        if self.is_end() {
            write!(f, ", end")?;
        }
        Ok(())
    }
}

/// Display list decoded from its base address for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdlListing {
    pub records: Vec<XdlRecord>,
    /// The list ran past a full screen without an end marker.
    pub truncated: bool,
}

impl XdlListing {
    #[must_use]
    pub fn decode(mem: &LocalMemory, base: u32) -> Self {
        let mut records = Vec::new();
        let mut addr = base;
        let mut lines = 0;

        loop {
            if lines >= XDL_HISTORY_LINES as u32 {
                return Self {
                    records,
                    truncated: true,
                };
            }
            let rec = XdlRecord::decode(mem, addr);
            lines += rec.lines();
            addr = memory::wrap(addr + rec.len);
            let end = rec.is_end();
            records.push(rec);
            if end {
                return Self {
                    records,
                    truncated: false,
                };
            }
        }
    }
}

impl fmt::Display for XdlListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rec in &self.records {
            writeln!(f, "{rec}")?;
        }
        if self.truncated {
            writeln!(
                f,
                "; listing stopped: no end marker within {XDL_HISTORY_LINES} scanlines"
            )?;
        }
        Ok(())
    }
}

/// Per-line display state driven by the display list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub overlay_mode: OverlayMode,
    pub overlay_width: OverlayWidth,
    pub overlay_address: u32,
    pub overlay_step: u32,
    pub overlay_hscroll: u8,
    pub overlay_vscroll: u8,
    /// Glyph row within the current text line.
    pub text_row: u8,
    pub charset_address: u32,

    pub map_enabled: bool,
    pub map_address: u32,
    pub map_step: u32,
    pub map_hscroll: u32,
    pub map_vscroll: u32,
    pub map_width: u32,
    pub map_height: u32,
    /// Row within the current attribute cell.
    pub map_row: u32,

    pub pf_palette: u8,
    pub ov_palette: u8,
    /// Overlay priority outside the attribute map, internal layout.
    pub main_priority: u8,
    /// Per-cell priorities P0-P3, selected by attribute control bits 0-1.
    pub band_priority: [u8; 4],
}

impl DisplayConfig {
    pub fn new() -> Self {
        Self {
            overlay_mode: OverlayMode::Disabled,
            overlay_width: OverlayWidth::Normal,
            overlay_address: 0,
            overlay_step: 0,
            overlay_hscroll: 0,
            overlay_vscroll: 0,
            text_row: 0,
            charset_address: 0,
            map_enabled: false,
            map_address: 0,
            map_step: 0,
            map_hscroll: 0,
            map_vscroll: 0,
            map_width: 8,
            map_height: 8,
            map_row: 0,
            pf_palette: 0,
            ov_palette: 1,
            main_priority: 0,
            band_priority: [0; 4],
        }
    }

    /// Frame-start defaults applied before the display list runs.
    fn frame_reset(&mut self) {
        self.overlay_mode = OverlayMode::Disabled;
        self.overlay_width = OverlayWidth::Normal;
        self.overlay_address = 0;
        self.overlay_step = 0;
        self.overlay_hscroll = 0;
        self.overlay_vscroll = 0;
        self.map_enabled = false;
        self.map_width = 8;
        self.map_height = 8;
        self.map_hscroll = 0;
        self.map_vscroll = 0;
        self.pf_palette = 0;
        self.ov_palette = 1;
    }

    /// Overlay and attribute-map DMA for the coming line.
    #[must_use]
    pub fn fetch_cost(&self, map_reloaded: bool) -> u32 {
        let mut cost = self.overlay_mode.fetch_cost(self.overlay_width);
        if self.map_enabled && (map_reloaded || self.map_row == 0) {
            let cells = (self.overlay_width.pixels() + self.map_hscroll - 1) / self.map_width + 1;
            cost += cells * 4;
        }
        cost
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XdlCursor {
    pub base_address: u32,
    pub fetch_address: u32,
    pub repeat_counter: u32,
    pub active: bool,
}

/// What one scanline's display-list step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineFetch {
    /// Record bytes read (0 on repeated lines).
    pub bytes: u32,
    /// The attribute map restarts from its vertical scroll this line.
    pub map_reloaded: bool,
}

/// Display state as it stood for one scanline of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XdlHistoryEntry {
    /// Address of the record fetched on this line, if any.
    pub record: Option<u32>,
    pub overlay_mode: OverlayMode,
    pub overlay_width: OverlayWidth,
    pub overlay_address: u32,
    pub overlay_step: u16,
    pub overlay_hscroll: u8,
    pub overlay_vscroll: u8,
    pub text_row: u8,
    pub charset_address: u32,
    pub map_enabled: bool,
    pub map_address: u32,
    pub map_step: u16,
    pub map_row: u8,
    pub pf_palette: u8,
    pub ov_palette: u8,
    pub main_priority: u8,
}

impl XdlHistoryEntry {
    fn capture(cfg: &DisplayConfig, record: Option<u32>) -> Self {
        Self {
            record,
            overlay_mode: cfg.overlay_mode,
            overlay_width: cfg.overlay_width,
            overlay_address: cfg.overlay_address,
            overlay_step: cfg.overlay_step as u16,
            overlay_hscroll: cfg.overlay_hscroll,
            overlay_vscroll: cfg.overlay_vscroll,
            text_row: cfg.text_row,
            charset_address: cfg.charset_address,
            map_enabled: cfg.map_enabled,
            map_address: cfg.map_address,
            map_step: cfg.map_step as u16,
            map_row: cfg.map_row as u8,
            pf_palette: cfg.pf_palette,
            ov_palette: cfg.ov_palette,
            main_priority: cfg.main_priority,
        }
    }
}

pub struct XdlProcessor {
    pub cursor: XdlCursor,
    /// Scanlines started since the frame began.
    pub line: usize,
    /// The display list was stopped this frame for running too long.
    pub overrun: bool,
    history: Vec<XdlHistoryEntry>,
}

impl XdlProcessor {
    pub fn new() -> Self {
        Self {
            cursor: XdlCursor {
                repeat_counter: 1,
                ..XdlCursor::default()
            },
            line: 0,
            overrun: false,
            history: vec![XdlHistoryEntry::default(); XDL_HISTORY_LINES],
        }
    }

    pub fn begin_frame(&mut self, enabled: bool, cfg: &mut DisplayConfig) {
        self.cursor.active = enabled;
        self.cursor.fetch_address = self.cursor.base_address;
        self.cursor.repeat_counter = 1;
        self.line = 0;
        self.overrun = false;
        self.history.fill(XdlHistoryEntry::default());
        cfg.frame_reset();
    }

    /// Stop the list at end of frame; also used by warm reset.
    pub fn halt(&mut self) {
        self.cursor.active = false;
    }

    /// Run the display list for one scanline.
    pub fn begin_scanline(
        &mut self,
        mem: &LocalMemory,
        cfg: &mut DisplayConfig,
        revision: CoreRevision,
    ) -> LineFetch {
        if self.cursor.active && self.line >= XDL_HISTORY_LINES {
            log::warn!(
                target: "vbxe::xdl",
                "display list at ${:05X} has no end marker after {} scanlines; stopping it",
                self.cursor.fetch_address,
                self.line
            );
            self.cursor.active = false;
            self.overrun = true;
        }

        let mut fetch = LineFetch::default();
        let mut record = None;

        self.cursor.repeat_counter = self.cursor.repeat_counter.wrapping_sub(1);
        if self.cursor.repeat_counter != 0 {
            cfg.text_row = (cfg.text_row + 1) & 7;
        } else if !self.cursor.active {
            // Nothing left to fetch: hold this state for the rest of the frame.
            self.cursor.repeat_counter = u32::MAX;
            cfg.map_enabled = false;
            cfg.overlay_mode = OverlayMode::Disabled;
        } else {
            let rec = XdlRecord::decode(mem, self.cursor.fetch_address);
            self.cursor.fetch_address = memory::wrap(self.cursor.fetch_address + rec.len);
            fetch = self.apply(&rec, cfg, revision);
            record = Some(rec.address);
        }

        if let Some(slot) = self.history.get_mut(self.line) {
            *slot = XdlHistoryEntry::capture(cfg, record);
        }
        self.line += 1;
        fetch
    }

    fn apply(&mut self, rec: &XdlRecord, cfg: &mut DisplayConfig, revision: CoreRevision) -> LineFetch {
        let mut map_reloaded = false;

        if let Some(mode) = rec.overlay_mode() {
            cfg.overlay_mode = mode;
        }
        if let Some(on) = rec.map_switch() {
            cfg.map_enabled = on;
            map_reloaded = on;
        }

        self.cursor.repeat_counter = rec.repeat.map_or(0, u32::from) + 1;

        if let Some((addr, step)) = rec.overlay {
            cfg.overlay_address = addr;
            cfg.overlay_step = step;
        }
        if let Some((h, v)) = rec.overlay_scroll {
            cfg.overlay_hscroll = h;
            cfg.overlay_vscroll = v;
        }
        if let Some(ch) = rec.charset {
            cfg.charset_address = u32::from(ch) << 11;
        }
        if let Some((addr, step)) = rec.map {
            cfg.map_address = addr;
            cfg.map_step = step;
            map_reloaded = true;
        }
        if let Some(g) = rec.map_geometry {
            cfg.map_hscroll = u32::from(g.hscroll);
            cfg.map_vscroll = u32::from(g.vscroll);
            cfg.map_width = u32::from(g.width);
            cfg.map_height = u32::from(g.height);
        }
        if let Some((ctl, pri)) = rec.attributes {
            cfg.overlay_width = OverlayWidth::from_ctl(ctl);
            cfg.pf_palette = ctl >> 6;
            cfg.ov_palette = (ctl >> 4) & 3;
            cfg.main_priority = revision.priority_to_native(pri);
        }
        if rec.is_end() {
            self.cursor.active = false;
        }

        cfg.text_row = cfg.overlay_vscroll & 7;
        if map_reloaded {
            cfg.map_row = cfg.map_vscroll % cfg.map_height;
        }

        LineFetch {
            bytes: rec.len,
            map_reloaded,
        }
    }

    /// Step overlay and attribute-map addresses past the line just shown.
    pub fn end_scanline(&self, cfg: &mut DisplayConfig) {
        if cfg.overlay_mode != OverlayMode::Disabled
            && (cfg.overlay_mode != OverlayMode::Text
                || self.cursor.repeat_counter == 1
                || cfg.text_row == 7)
        {
            cfg.overlay_address = memory::wrap(cfg.overlay_address + cfg.overlay_step);
        }

        if cfg.map_enabled {
            cfg.map_row += 1;
            if cfg.map_row >= cfg.map_height {
                cfg.map_row = 0;
                cfg.map_address = memory::wrap(cfg.map_address + cfg.map_step);
            }
        }
    }

    #[must_use]
    pub fn history(&self, line: usize) -> Option<&XdlHistoryEntry> {
        self.history.get(line).filter(|_| line < self.line)
    }
}

impl Default for XdlProcessor {
    fn default() -> Self {
        Self::new()
    }
}
