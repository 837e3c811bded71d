//! The VBXE chip.
//!
//! The machine drives it once per scanline:
//!
//! 1. [`Vbxe::begin_scanline`] runs the display list, charges its DMA and
//!    lets the blitter use what is left of the line.
//! 2. [`Vbxe::render_scanline`] is called as ANTIC and GTIA produce each
//!    stretch of the line. GTIA colour writes in between are queued with
//!    [`Vbxe::add_register_change`] and take effect on their colour clock.
//! 3. [`Vbxe::end_scanline`] finishes the line and steps the overlay and
//!    attribute map down.
//!
//! Register accesses arrive through the page the chip maps with
//! [`MemoryMap`]. The blitter's end-of-list latency runs on the machine's
//! scheduler; the machine hands the event back via [`Vbxe::handle_event`].

use std::fmt;

use emu_core::{EventId, IrqController, IrqSource, Observable, Scheduler, Value, parse_address};

use crate::blitter::{BlitListing, Blitter, BlitterState, LINE_BUDGET};
use crate::changes::ChangeQueue;
use crate::compositor::{COLOR_CLOCKS, Compositor, SpanInput};
use crate::config::VbxeConfig;
use crate::memac::{Layer, Memac, MemoryMap, PageMapping};
use crate::memory::{ADDRESS_MASK, LocalMemory};
use crate::overlay::{Overlay, OverlayFlags};
use crate::palette::Palettes;
use crate::xdl::{DisplayConfig, OverlayMode, OverlayWidth, XdlListing, XdlProcessor};

/// Fires when the blitter's stop latency has elapsed.
pub const BLIT_STOP_EVENT: EventId = EventId(0x5642_0001);

pub const BLITTER_IRQ: IrqSource = IrqSource("vbxe");

const CORE_VERSION: u8 = 0x10;

/// Everything the chip needs from the machine.
pub trait VbxeHost: Scheduler + IrqController + MemoryMap {}

impl<T: Scheduler + IrqController + MemoryMap + ?Sized> VbxeHost for T {}

pub struct Vbxe {
    pub config: VbxeConfig,
    pub memory: LocalMemory,
    pub palettes: Palettes,
    pub display: DisplayConfig,
    pub xdl: XdlProcessor,
    pub blitter: Blitter,
    pub compositor: Compositor,
    pub overlay: Overlay,
    pub memac: Memac,
    pub(crate) changes: ChangeQueue,

    /// VIDEO_CONTROL bit 0.
    pub xdl_enabled: bool,
    pub irq_enabled: bool,
    pub irq_request: bool,
    /// Serial configuration latch at $80-$FF.
    pub config_latch: u8,
    /// DMA units charged to the current line.
    pub dma_charge: u32,

    /// Render frontier in colour clocks.
    pub(crate) x: usize,
    pub(crate) in_scanline: bool,
}

impl Vbxe {
    /// Build the chip. Call [`cold_reset`](Self::cold_reset) before use so
    /// that the register page and windows are mapped.
    pub fn new(config: VbxeConfig) -> Self {
        let memory = if config.shared_memory {
            LocalMemory::new_shared()
        } else {
            LocalMemory::new()
        };
        let mut blitter = Blitter::new();
        blitter.log = config.log_blits;

        Self {
            compositor: Compositor::new(config.revision),
            config,
            memory,
            palettes: Palettes::new(),
            display: DisplayConfig::new(),
            xdl: XdlProcessor::new(),
            blitter,
            overlay: Overlay::new(),
            memac: Memac::default(),
            changes: ChangeQueue::new(),
            xdl_enabled: false,
            irq_enabled: false,
            irq_request: false,
            config_latch: 0,
            dma_charge: 0,
            x: 0,
            in_scanline: false,
        }
    }

    /// Palette loaded into bank 0 on cold reset, already colour-corrected
    /// by the machine.
    pub fn set_default_palette(&mut self, palette: &[u32; 256]) {
        self.palettes.default = *palette;
    }

    pub fn set_log_blits(&mut self, enabled: bool) {
        self.config.log_blits = enabled;
        self.blitter.log = enabled;
    }

    // ------------------------------------------------------------------
    // Resets and mapping

    pub fn cold_reset(&mut self, host: &mut impl VbxeHost) {
        self.palettes.cold_reset();
        self.memac = Memac::default();
        self.display = DisplayConfig::new();
        self.xdl = XdlProcessor::new();
        self.blitter.list_address = 0;
        self.blitter.fetch_address = 0;
        self.warm_reset(host);
    }

    pub fn warm_reset(&mut self, host: &mut impl VbxeHost) {
        self.xdl_enabled = false;
        self.compositor.extended_color = false;
        self.overlay.flags = OverlayFlags::default();

        self.memac.warm_reset();

        self.blitter.reset();
        host.cancel(BLIT_STOP_EVENT);

        if self.irq_request && self.irq_enabled {
            host.negate_irq(BLITTER_IRQ);
        }
        self.irq_enabled = false;
        self.irq_request = false;

        self.xdl.halt();
        self.display.overlay_width = OverlayWidth::Normal;
        self.display.overlay_mode = OverlayMode::Disabled;

        self.map_layers(host);
    }

    /// Move the register page ($D6 or $D7).
    pub fn set_register_page(&mut self, host: &mut impl MemoryMap, page: u8) {
        self.config.register_page = page;
        self.map_layers(host);
    }

    pub fn set_5200_mode(&mut self, host: &mut impl MemoryMap, enabled: bool) {
        self.config.mode_5200 = enabled;
        self.map_layers(host);
    }

    pub(crate) fn map_layers(&self, host: &mut impl MemoryMap) {
        host.map_layer(
            Layer::Registers,
            Some(PageMapping {
                first_page: self.config.register_page,
                pages: 1,
                local_base: 0,
                cpu: true,
                antic: false,
            }),
        );

        let (first_page, pages) = if self.config.mode_5200 {
            (0xC0, 16)
        } else {
            (0xD0, 1)
        };
        host.map_layer(
            Layer::GtiaShadow,
            Some(PageMapping {
                first_page,
                pages,
                local_base: 0,
                cpu: true,
                antic: false,
            }),
        );

        self.map_windows(host);
    }

    fn map_windows(&self, host: &mut impl MemoryMap) {
        host.map_layer(Layer::WindowA, self.memac.window_a(self.config.mode_5200));
        host.map_layer(Layer::WindowB, self.memac.window_b(self.config.mode_5200));
    }

    // ------------------------------------------------------------------
    // CPU interface

    /// Read a register at `offset` within the register page. `None` means
    /// the chip does not drive the bus.
    #[must_use]
    pub fn read_register(&self, offset: u8) -> Option<u8> {
        let value = match offset {
            0x40 => CORE_VERSION,
            0x41 => self.config.revision.minor_revision(),
            0x4A => self.overlay.collision_state,
            0x50 => self.blitter.collision_code,
            0x53 => self.blitter.status(),
            0x54 => u8::from(self.irq_request),
            0x5D => self.memac.bank_b,
            0x5E => self.memac.control,
            0x5F => self.memac.bank_a,
            0x80..=0xFF => self.config_latch,
            _ => return None,
        };
        Some(value)
    }

    /// Write a register. Returns `false` if nothing at `offset` is decoded.
    pub fn write_register(&mut self, host: &mut impl VbxeHost, offset: u8, value: u8) -> bool {
        log::trace!(target: "vbxe::reg", "${offset:02X} <- ${value:02X}");

        match offset {
            0x40 => self.set_video_control(value),
            0x41 => set_address_byte(&mut self.xdl.cursor.base_address, 0, value),
            0x42 => set_address_byte(&mut self.xdl.cursor.base_address, 1, value),
            0x43 => set_address_byte(&mut self.xdl.cursor.base_address, 2, value),
            0x44 => self.palettes.csel = value,
            0x45 => self.palettes.psel = value & 3,
            0x46 => self.palettes.write_red(value),
            0x47 => self.palettes.write_green(value),
            0x48 => self.palettes.write_blue(value),
            0x49 => self.overlay.collision_mask = value,
            0x4A => self.overlay.collision_state = 0,
            0x50 => set_address_byte(&mut self.blitter.list_address, 0, value),
            0x51 => set_address_byte(&mut self.blitter.list_address, 1, value),
            0x52 => set_address_byte(&mut self.blitter.list_address, 2, value),
            0x53 => {
                if value & 1 != 0 {
                    self.blitter.start(&self.memory);
                } else if self.blitter.stop() {
                    host.cancel(BLIT_STOP_EVENT);
                }
            }
            0x54 => {
                if self.irq_request {
                    self.irq_request = false;
                    if self.irq_enabled {
                        host.negate_irq(BLITTER_IRQ);
                    }
                }
                self.irq_enabled = value & 1 != 0;
            }
            0x55..=0x58 => {
                let band = usize::from(offset - 0x55);
                self.display.band_priority[band] = self.config.revision.priority_to_native(value);
            }
            0x5D => self.set_memac(host, |m| m.bank_b = value),
            0x5E => self.set_memac(host, |m| m.control = value),
            0x5F => self.set_memac(host, |m| m.bank_a = value),
            0x80..=0xFF => self.config_latch = (self.config_latch << 1) | (value & 1),
            _ => return false,
        }
        true
    }

    /// VIDEO_CONTROL as last written.
    #[must_use]
    pub fn video_control(&self) -> u8 {
        u8::from(self.xdl_enabled)
            | (u8::from(self.compositor.extended_color) << 1)
            | (u8::from(!self.overlay.flags.transparent) << 2)
            | (u8::from(self.overlay.flags.transparent_15) << 3)
    }

    pub(crate) fn set_video_control(&mut self, value: u8) {
        self.xdl_enabled = value & 0x01 != 0;
        self.compositor.extended_color = value & 0x02 != 0;
        self.overlay.flags.transparent = value & 0x04 == 0;
        self.overlay.flags.transparent_15 = value & 0x08 != 0;
    }

    fn set_memac(&mut self, host: &mut impl MemoryMap, f: impl FnOnce(&mut Memac)) {
        let before = self.memac;
        f(&mut self.memac);
        if self.memac != before {
            self.map_windows(host);
        }
    }

    /// Write into the GTIA page. The FX core watches $D080-$D0FF and
    /// warm-resets on any write there.
    pub fn gtia_shadow_write(&mut self, host: &mut impl VbxeHost, offset: u8) {
        if offset >= 0x80 {
            log::debug!(target: "vbxe::reg", "GTIA shadow write at ${offset:02X}: warm reset");
            self.warm_reset(host);
        }
    }

    /// CPU read through a MEMAC window.
    #[must_use]
    pub fn window_read(&self, addr: u16) -> Option<u8> {
        let local = self.memac.resolve(addr, self.config.mode_5200, false)?;
        Some(self.memory.read(local))
    }

    /// CPU write through a MEMAC window. Returns `false` if no window
    /// covers `addr`.
    pub fn window_write(&mut self, addr: u16, value: u8) -> bool {
        match self.memac.resolve(addr, self.config.mode_5200, false) {
            Some(local) => {
                self.memory.write(local, value);
                true
            }
            None => false,
        }
    }

    /// ANTIC fetch through a MEMAC window.
    #[must_use]
    pub fn antic_read(&self, addr: u16) -> Option<u8> {
        let local = self.memac.resolve(addr, self.config.mode_5200, true)?;
        Some(self.memory.read(local))
    }

    // ------------------------------------------------------------------
    // Frame and scanline

    pub fn begin_frame(&mut self) {
        self.xdl.begin_frame(self.xdl_enabled, &mut self.display);
        self.dma_charge = 0;
    }

    pub fn end_frame(&mut self) {
        self.xdl.halt();
    }

    /// Start a scanline. `hires` is GTIA's 40-column latch for the line.
    pub fn begin_scanline(&mut self, host: &mut impl VbxeHost, hires: bool) {
        self.x = 0;
        self.in_scanline = true;
        self.compositor.begin_line(&self.display, &self.palettes, hires);

        let fetch = self.xdl.begin_scanline(&self.memory, &mut self.display, self.config.revision);
        self.dma_charge = fetch.bytes + self.display.fetch_cost(fetch.map_reloaded);

        self.blitter.credit(LINE_BUDGET - self.dma_charge as i32);
        self.run_blitter(host);
    }

    fn run_blitter(&mut self, host: &mut impl VbxeHost) {
        if let Some(delay) = self.blitter.run(&mut self.memory) {
            host.schedule(delay, BLIT_STOP_EVENT);
        }
    }

    /// Render up to colour clock `x2`. `merge` holds GTIA's plane bits and
    /// `antic` the playfield data for each colour clock of the line.
    pub fn render_scanline(
        &mut self,
        x2: usize,
        merge: &[u8; COLOR_CLOCKS],
        antic: &[u8; COLOR_CLOCKS],
        pfpm_rendered: bool,
    ) {
        if !self.in_scanline {
            return;
        }
        let end = x2.min(COLOR_CLOCKS);
        let mut x1 = self.x;

        while x1 < end {
            while let Some(change) = self.changes.pop_due(x1) {
                self.compositor.write_register(change.register, change.value);
            }
            let span_end = self.changes.next_position().map_or(end, |p| p.min(end));

            let input = SpanInput {
                mem: &self.memory,
                cfg: &self.display,
                palettes: &self.palettes,
                merge,
                antic,
                pfpm_rendered,
            };
            self.compositor.render_span(&input, x1, span_end);
            self.overlay.render(
                &self.memory,
                &self.display,
                &self.palettes,
                &mut self.compositor,
                x1,
                span_end,
            );
            x1 = span_end;
        }

        self.x = x1;
    }

    /// Finish the line. Calling it again before the next
    /// [`begin_scanline`](Self::begin_scanline) does nothing.
    pub fn end_scanline(&mut self) {
        if !self.in_scanline {
            return;
        }
        self.in_scanline = false;

        self.compositor.fill_right_border(&self.display, &self.palettes);
        for change in self.changes.take_pending() {
            self.compositor.write_register(change.register, change.value);
        }
        self.xdl.end_scanline(&mut self.display);
    }

    /// Queue a GTIA colour or PRIOR write at colour clock `position`.
    /// Outside a scanline the write applies at once.
    pub fn add_register_change(&mut self, position: u8, register: u8, value: u8) {
        if self.in_scanline {
            self.changes.push(position, register, value);
        } else {
            self.compositor.write_register(register, value);
        }
    }

    /// The line being built: 912 pixels, 0x00RRGGBB.
    #[must_use]
    pub fn scanline(&self) -> &[u32] {
        self.compositor.line()
    }

    #[must_use]
    pub fn in_scanline(&self) -> bool {
        self.in_scanline
    }

    /// Deliver a scheduler event. Returns `false` if the event is not ours.
    pub fn handle_event(&mut self, host: &mut impl VbxeHost, event: EventId) -> bool {
        if event != BLIT_STOP_EVENT {
            return false;
        }
        if self.blitter.finish_stop() && !self.irq_request {
            self.irq_request = true;
            if self.irq_enabled {
                host.assert_irq(BLITTER_IRQ);
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Debugging

    #[must_use]
    pub fn xdl_listing(&self) -> XdlListing {
        XdlListing::decode(&self.memory, self.xdl.cursor.base_address)
    }

    #[must_use]
    pub fn blit_listing(&self) -> BlitListing {
        BlitListing::decode(&self.memory, self.blitter.list_address)
    }

    #[must_use]
    pub fn status(&self) -> VbxeStatus {
        let rev = self.config.revision;
        VbxeStatus {
            xdl_enabled: self.xdl_enabled,
            xdl_active: self.xdl.cursor.active,
            xdl_base: self.xdl.cursor.base_address,
            xdl_fetch: self.xdl.cursor.fetch_address,
            overlay_width: self.display.overlay_width,
            overlay_mode: self.display.overlay_mode,
            overlay_address: self.display.overlay_address,
            overlay_step: self.display.overlay_step,
            main_priority: rev.priority_from_native(self.display.main_priority),
            band_priority: self.display.band_priority.map(|p| rev.priority_from_native(p)),
            mode_5200: self.config.mode_5200,
            memac: self.memac,
            window_a: self.memac.window_a(self.config.mode_5200),
            window_b: self.memac.window_b(self.config.mode_5200),
            irq_enabled: self.irq_enabled,
            irq_request: self.irq_request,
            blitter_state: self.blitter.state,
            rows_left: self.blitter.rows_left,
            list_address: self.blitter.list_address,
            list_fetch: self.blitter.fetch_address,
        }
    }
}

/// Replace byte `index` of a 19-bit address.
fn set_address_byte(addr: &mut u32, index: u32, value: u8) {
    let shift = index * 8;
    *addr = ((*addr & !(0xFF << shift)) | (u32::from(value) << shift)) & ADDRESS_MASK;
}

/// Snapshot of the chip's registers for the debugger.
#[derive(Debug, Clone)]
pub struct VbxeStatus {
    pub xdl_enabled: bool,
    pub xdl_active: bool,
    pub xdl_base: u32,
    pub xdl_fetch: u32,
    pub overlay_width: OverlayWidth,
    pub overlay_mode: OverlayMode,
    pub overlay_address: u32,
    pub overlay_step: u32,
    /// Priorities as the CPU wrote them.
    pub main_priority: u8,
    pub band_priority: [u8; 4],
    pub mode_5200: bool,
    pub memac: Memac,
    pub window_a: Option<PageMapping>,
    pub window_b: Option<PageMapping>,
    pub irq_enabled: bool,
    pub irq_request: bool,
    pub blitter_state: BlitterState,
    pub rows_left: u32,
    pub list_address: u32,
    pub list_fetch: u32,
}

fn access(m: Option<&PageMapping>) -> &'static str {
    match m.map(|m| (m.cpu, m.antic)) {
        Some((true, true)) => "CPU and ANTIC",
        Some((true, false)) => "CPU only",
        Some((false, true)) => "ANTIC only",
        _ => "disabled",
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

impl fmt::Display for VbxeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "XDL enabled:       {}", yes_no(self.xdl_enabled))?;
        writeln!(f, "XDL active:        {}", yes_no(self.xdl_active))?;
        writeln!(f, "XDL base address:  ${:05X}", self.xdl_base)?;
        writeln!(f, "XDL fetch address: ${:05X}", self.xdl_fetch)?;
        writeln!(f, "Overlay width:     {:?}", self.overlay_width)?;
        writeln!(f, "Overlay mode:      {:?}", self.overlay_mode)?;
        writeln!(f, "Overlay address:   ${:05X}", self.overlay_address)?;
        writeln!(f, "Overlay step:      ${:03X}", self.overlay_step)?;
        let [p0, p1, p2, p3] = self.band_priority;
        writeln!(
            f,
            "Overlay priority:  ${:02X} | {p0:02X} {p1:02X} {p2:02X} {p3:02X}",
            self.main_priority
        )?;

        match (self.mode_5200, self.window_a) {
            (true, Some(a)) => writeln!(
                f,
                "MEMAC window A:    ${:02X} | $D800-$E7FF -> ${:05X}",
                self.memac.bank_a, a.local_base
            )?,
            (_, a) => {
                let start = u32::from(self.memac.control & 0xF0) << 8;
                let pages = a.map_or(16 << (self.memac.control & 3), |a| u32::from(a.pages));
                let limit = (start + pages * 0x100).min(0x1_0000);
                let base = a.map_or(0, |a| a.local_base);
                writeln!(
                    f,
                    "MEMAC window A:    ${:02X} | ${start:04X}-${:04X} -> ${base:05X} - {}",
                    self.memac.bank_a,
                    limit - 1,
                    access(a.as_ref())
                )?;
            }
        }
        if !self.mode_5200 {
            writeln!(
                f,
                "MEMAC window B:    ${:02X} | ${:05X} - {}",
                self.memac.bank_b,
                u32::from(self.memac.bank_b & 0x1F) << 14,
                access(self.window_b.as_ref())
            )?;
        }

        writeln!(
            f,
            "Blitter IRQ:       {}, {}",
            if self.irq_enabled { "enabled" } else { "disabled" },
            if self.irq_request { "asserted" } else { "negated" }
        )?;
        match self.blitter_state {
            BlitterState::ProcessBlit => {
                writeln!(f, "Blitter status:    active ({} rows left)", self.rows_left)?;
            }
            BlitterState::Reload => writeln!(f, "Blitter status:    reloading")?,
            BlitterState::Stopping => writeln!(f, "Blitter status:    stopping")?,
            BlitterState::Stopped => writeln!(f, "Blitter status:    stopped")?,
        }
        writeln!(f, "Blitter list addr: ${:05X}", self.list_address)?;
        write!(f, "Blitter list cur.: ${:05X}", self.list_fetch)
    }
}

impl Observable for Vbxe {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("xdl.history.") {
            let (line, field) = rest.split_once('.')?;
            let e = self.xdl.history(line.parse().ok()?)?;
            match field {
                "record" => Some(e.record.into()),
                "overlay_mode" => Some(format!("{:?}", e.overlay_mode).into()),
                "overlay_width" => Some(format!("{:?}", e.overlay_width).into()),
                "overlay_address" => Some(e.overlay_address.into()),
                "overlay_step" => Some(e.overlay_step.into()),
                "overlay_hscroll" => Some(e.overlay_hscroll.into()),
                "overlay_vscroll" => Some(e.overlay_vscroll.into()),
                "text_row" => Some(e.text_row.into()),
                "charset" => Some(e.charset_address.into()),
                "map_enabled" => Some(e.map_enabled.into()),
                "map_address" => Some(e.map_address.into()),
                "map_step" => Some(e.map_step.into()),
                "map_row" => Some(e.map_row.into()),
                "pf_palette" => Some(e.pf_palette.into()),
                "ov_palette" => Some(e.ov_palette.into()),
                "priority" => Some(self.config.revision.priority_from_native(e.main_priority).into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("xdl.") {
            let c = &self.xdl.cursor;
            match rest {
                "enabled" => Some(self.xdl_enabled.into()),
                "active" => Some(c.active.into()),
                "base" => Some(c.base_address.into()),
                "fetch" => Some(c.fetch_address.into()),
                "repeat" => Some(c.repeat_counter.into()),
                "line" => Some((self.xdl.line as u32).into()),
                "overrun" => Some(self.xdl.overrun.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("overlay.") {
            let d = &self.display;
            match rest {
                "mode" => Some(format!("{:?}", d.overlay_mode).into()),
                "width" => Some(format!("{:?}", d.overlay_width).into()),
                "address" => Some(d.overlay_address.into()),
                "step" => Some(d.overlay_step.into()),
                "hscroll" => Some(d.overlay_hscroll.into()),
                "vscroll" => Some(d.overlay_vscroll.into()),
                "text_row" => Some(d.text_row.into()),
                "charset" => Some(d.charset_address.into()),
                "palette" => Some(d.ov_palette.into()),
                "priority" => Some(self.config.revision.priority_from_native(d.main_priority).into()),
                "transparent" => Some(self.overlay.flags.transparent.into()),
                "transparent_15" => Some(self.overlay.flags.transparent_15.into()),
                "collision_mask" => Some(self.overlay.collision_mask.into()),
                "collision_state" => Some(self.overlay.collision_state.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("map.") {
            let d = &self.display;
            match rest {
                "enabled" => Some(d.map_enabled.into()),
                "address" => Some(d.map_address.into()),
                "step" => Some(d.map_step.into()),
                "row" => Some(d.map_row.into()),
                "width" => Some(d.map_width.into()),
                "height" => Some(d.map_height.into()),
                "hscroll" => Some(d.map_hscroll.into()),
                "vscroll" => Some(d.map_vscroll.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("blitter.") {
            let b = &self.blitter;
            match rest {
                "state" => Some(format!("{:?}", b.state).into()),
                "status" => Some(b.status().into()),
                "list" => Some(b.list_address.into()),
                "fetch" => Some(b.fetch_address.into()),
                "source" => Some(b.bcb.source.into()),
                "dest" => Some(b.bcb.dest.into()),
                "mode" => Some(format!("{:?}", b.bcb.mode).into()),
                "rows_left" => Some(b.rows_left.into()),
                "collision_code" => Some(b.collision_code.into()),
                "balance" => Some(b.balance.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("irq.") {
            match rest {
                "enabled" => Some(self.irq_enabled.into()),
                "request" => Some(self.irq_request.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memac.") {
            match rest {
                "control" => Some(self.memac.control.into()),
                "bank_a" => Some(self.memac.bank_a.into()),
                "bank_b" => Some(self.memac.bank_b.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("palette.") {
            match rest {
                "csel" => Some(self.palettes.csel.into()),
                "psel" => Some(self.palettes.psel.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            let addr = parse_address(rest).filter(|&a| a <= ADDRESS_MASK)?;
            Some(self.memory.read(addr).into())
        } else {
            match path {
                "video_control" => Some(self.video_control().into()),
                "gtia.prior" => Some(self.compositor.prior.into()),
                "gtia.hires" => Some(self.compositor.hires.into()),
                "dma.charge" => Some(self.dma_charge.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "video_control",
            "xdl.enabled",
            "xdl.active",
            "xdl.base",
            "xdl.fetch",
            "xdl.repeat",
            "xdl.line",
            "xdl.overrun",
            "xdl.history.<line>.<field>",
            "overlay.mode",
            "overlay.width",
            "overlay.address",
            "overlay.step",
            "overlay.hscroll",
            "overlay.vscroll",
            "overlay.text_row",
            "overlay.charset",
            "overlay.palette",
            "overlay.priority",
            "overlay.transparent",
            "overlay.transparent_15",
            "overlay.collision_mask",
            "overlay.collision_state",
            "map.enabled",
            "map.address",
            "map.step",
            "map.row",
            "map.width",
            "map.height",
            "map.hscroll",
            "map.vscroll",
            "blitter.state",
            "blitter.status",
            "blitter.list",
            "blitter.fetch",
            "blitter.source",
            "blitter.dest",
            "blitter.mode",
            "blitter.rows_left",
            "blitter.collision_code",
            "blitter.balance",
            "irq.enabled",
            "irq.request",
            "memac.control",
            "memac.bank_a",
            "memac.bank_b",
            "palette.csel",
            "palette.psel",
            "gtia.prior",
            "gtia.hires",
            "dma.charge",
            "memory.<addr>",
        ]
    }
}
