//! Save states.
//!
//! A snapshot holds the architectural state: registers, the display
//! configuration the list left behind, the blitter mid-block, queued
//! register changes and (unless the machine owns it) local memory. Priority
//! tables, the colour table and decoded attribute cells are rebuilt on
//! restore.

use std::fmt;

use emu_core::{IrqController, Scheduler, Ticks};
use serde::{Deserialize, Serialize};

use crate::blitter::{Blitter, BlitterState};
use crate::changes::RegisterChange;
use crate::compositor::{COLOR_CLOCKS, GTIA_FIRST, GTIA_REGISTERS, PRIOR};
use crate::config::CoreRevision;
use crate::memac::Memac;
use crate::memory::{ADDRESS_MASK, LOCAL_MEMORY_SIZE};
use crate::palette::PALETTE_BANKS;
use crate::vbxe::{BLIT_STOP_EVENT, BLITTER_IRQ, Vbxe, VbxeHost};
use crate::xdl::{DisplayConfig, XdlCursor};

/// Magic bytes for snapshot identification.
const SNAPSHOT_MAGIC: &[u8; 4] = b"VBXS";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 1;

const PALETTE_ENTRIES: usize = PALETTE_BANKS * 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    Truncated,
    BadMagic,
    UnsupportedVersion(u8),
    Encode(String),
    Decode(String),
    /// Decoded, but describes a state the chip cannot be in.
    Invalid(&'static str),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "VBXE snapshot is truncated"),
            Self::BadMagic => write!(f, "not a VBXE snapshot"),
            Self::UnsupportedVersion(v) => write!(
                f,
                "unsupported VBXE snapshot version {v} (expected {SNAPSHOT_VERSION})"
            ),
            Self::Encode(e) => write!(f, "cannot encode VBXE snapshot: {e}"),
            Self::Decode(e) => write!(f, "corrupt VBXE snapshot: {e}"),
            Self::Invalid(why) => write!(f, "invalid VBXE snapshot: {why}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VbxeSnapshot {
    pub revision: CoreRevision,
    /// `None` when the machine saves local memory itself.
    pub memory: Option<Vec<u8>>,
    pub video_control: u8,
    pub xdl: XdlCursor,
    pub xdl_line: u32,
    pub xdl_overrun: bool,
    pub display: DisplayConfig,
    /// All four banks, bank 0 first.
    pub palettes: Vec<u32>,
    pub csel: u8,
    pub psel: u8,
    pub blitter: Blitter,
    /// Ticks left on the blitter's stop event.
    pub stop_pending: Option<u64>,
    pub collision_mask: u8,
    pub collision_state: u8,
    /// Unapplied mid-line register writes.
    pub changes: Vec<RegisterChange>,
    pub gtia: [u8; GTIA_REGISTERS],
    pub hires: bool,
    pub memac: Memac,
    pub irq_enabled: bool,
    pub irq_request: bool,
    pub config_latch: u8,
    pub dma_charge: u32,
    pub in_scanline: bool,
    pub render_x: u32,
}

impl VbxeSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = rmp_serde::to_vec_named(self).map_err(|e| SnapshotError::Encode(e.to_string()))?;
        let mut data = Vec::with_capacity(payload.len() + 5);
        data.extend_from_slice(SNAPSHOT_MAGIC);
        data.push(SNAPSHOT_VERSION);
        data.extend_from_slice(&payload);
        Ok(data)
    }

    /// Decode and validate. Nothing is applied to a chip here.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < 5 {
            return Err(SnapshotError::Truncated);
        }
        if &data[..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        if data[4] != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(data[4]));
        }
        let snap: Self =
            rmp_serde::from_slice(&data[5..]).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        snap.validate()?;
        Ok(snap)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        use SnapshotError::Invalid;

        if self.memory.as_ref().is_some_and(|m| m.len() != LOCAL_MEMORY_SIZE) {
            return Err(Invalid("local memory is the wrong size"));
        }
        if self.palettes.len() != PALETTE_ENTRIES {
            return Err(Invalid("palette RAM is the wrong size"));
        }
        let addresses = [
            self.xdl.base_address,
            self.xdl.fetch_address,
            self.blitter.list_address,
            self.blitter.fetch_address,
            self.display.overlay_address,
            self.display.map_address,
            self.blitter.bcb.source,
            self.blitter.bcb.dest,
        ];
        if addresses.iter().any(|&a| a > ADDRESS_MASK) {
            return Err(Invalid("address outside local memory"));
        }
        if self.display.map_width == 0 || self.display.map_height == 0 {
            return Err(Invalid("attribute cell has zero size"));
        }
        if self.display.map_width < 8 || self.display.map_width > 32 || self.display.map_height > 32 {
            return Err(Invalid("attribute cell size out of range"));
        }
        if self.display.map_row >= 32 {
            return Err(Invalid("attribute row out of range"));
        }
        if self.display.text_row > 7 {
            return Err(Invalid("text row out of range"));
        }
        if self.blitter.state == BlitterState::ProcessBlit {
            validate_blit(&self.blitter).map_err(Invalid)?;
        }
        if self.stop_pending.is_some() != (self.blitter.state == BlitterState::Stopping) {
            return Err(Invalid("stop event does not match blitter state"));
        }
        if self.changes.iter().any(|c| usize::from(c.position) >= COLOR_CLOCKS) {
            return Err(Invalid("register change past the end of the line"));
        }
        if self.render_x as usize > COLOR_CLOCKS {
            return Err(Invalid("render position past the end of the line"));
        }
        Ok(())
    }
}

/// A block in progress must be one a BCB could have produced.
fn validate_blit(b: &Blitter) -> Result<(), &'static str> {
    let bcb = &b.bcb;
    if !(1..=512).contains(&bcb.width) || !(1..=256).contains(&bcb.height) {
        return Err("blit size out of range");
    }
    if !(1..=8).contains(&bcb.zoom_x) || !(1..=8).contains(&bcb.zoom_y) {
        return Err("blit zoom out of range");
    }
    if bcb.pattern.is_some_and(|p| !(1..=64).contains(&p)) {
        return Err("blit pattern period out of range");
    }
    let step_x = i32::from(i8::MIN)..=i32::from(i8::MAX);
    if !step_x.contains(&bcb.source_step_x) || !step_x.contains(&bcb.dest_step_x) {
        return Err("blit X step out of range");
    }
    let step_y = -0x1000..=0xFFF;
    if !step_y.contains(&bcb.source_step_y) || !step_y.contains(&bcb.dest_step_y) {
        return Err("blit Y step out of range");
    }
    if !(1..=bcb.height).contains(&b.rows_left) {
        return Err("blit rows left out of range");
    }
    if b.zoom_counter_y >= bcb.zoom_y {
        return Err("blit zoom counter out of range");
    }
    if b.row_cost != bcb.row_cost() {
        return Err("blit row cost does not match its block");
    }
    if b.armed_mask & !bcb.collision_mask != 0 {
        return Err("blit collision arming outside its mask");
    }
    Ok(())
}

impl Vbxe {
    #[must_use]
    pub fn snapshot(&self, host: &impl Scheduler) -> VbxeSnapshot {
        let stop_pending = if self.blitter.state == BlitterState::Stopping {
            Some(host.remaining(BLIT_STOP_EVENT).map_or(0, Ticks::get))
        } else {
            None
        };

        VbxeSnapshot {
            revision: self.config.revision,
            memory: (!self.memory.is_shared()).then(|| self.memory.as_slice().to_vec()),
            video_control: self.video_control(),
            xdl: self.xdl.cursor,
            xdl_line: self.xdl.line as u32,
            xdl_overrun: self.xdl.overrun,
            display: self.display.clone(),
            palettes: self.palettes.banks.iter().flatten().copied().collect(),
            csel: self.palettes.csel,
            psel: self.palettes.psel,
            blitter: self.blitter.clone(),
            stop_pending,
            collision_mask: self.overlay.collision_mask,
            collision_state: self.overlay.collision_state,
            changes: self.changes.pending().to_vec(),
            gtia: self.compositor.gtia,
            hires: self.compositor.hires,
            memac: self.memac,
            irq_enabled: self.irq_enabled,
            irq_request: self.irq_request,
            config_latch: self.config_latch,
            dma_charge: self.dma_charge,
            in_scanline: self.in_scanline,
            render_x: self.x as u32,
        }
    }

    /// Restore a snapshot. On error the chip is left untouched.
    pub fn restore(&mut self, host: &mut impl VbxeHost, snap: &VbxeSnapshot) -> Result<(), SnapshotError> {
        snap.validate()?;
        if snap.memory.is_none() && !self.memory.is_shared() {
            return Err(SnapshotError::Invalid("local memory missing"));
        }

        if let Some(mem) = &snap.memory {
            if !self.memory.is_shared() {
                self.memory.as_mut_slice().copy_from_slice(mem);
            }
        }

        self.config.revision = snap.revision;
        self.compositor.revision = snap.revision;
        self.set_video_control(snap.video_control);

        self.xdl.cursor = snap.xdl;
        self.xdl.line = snap.xdl_line as usize;
        self.xdl.overrun = snap.xdl_overrun;
        self.display = snap.display.clone();

        for (bank, chunk) in self.palettes.banks.iter_mut().zip(snap.palettes.chunks_exact(256)) {
            bank.copy_from_slice(chunk);
        }
        self.palettes.csel = snap.csel;
        self.palettes.psel = snap.psel & 3;

        let log = self.blitter.log;
        self.blitter = snap.blitter.clone();
        self.blitter.log = log;
        host.cancel(BLIT_STOP_EVENT);
        if let Some(ticks) = snap.stop_pending {
            host.schedule(Ticks::new(ticks), BLIT_STOP_EVENT);
        }

        self.overlay.collision_mask = snap.collision_mask;
        self.overlay.collision_state = snap.collision_state;
        self.changes.restore(snap.changes.clone());

        self.compositor.gtia = snap.gtia;
        self.compositor.prior = snap.gtia[usize::from(PRIOR - GTIA_FIRST)];
        self.compositor.hires = snap.hires;
        self.compositor.rebuild_color_table();

        self.memac = snap.memac;
        self.irq_enabled = snap.irq_enabled;
        self.irq_request = snap.irq_request;
        if self.irq_enabled && self.irq_request {
            host.assert_irq(BLITTER_IRQ);
        } else {
            host.negate_irq(BLITTER_IRQ);
        }

        self.config_latch = snap.config_latch;
        self.dma_charge = snap.dma_charge;
        self.in_scanline = snap.in_scanline;
        self.x = snap.render_x as usize;

        self.map_layers(host);
        Ok(())
    }

    pub fn save_state(&self, host: &impl Scheduler) -> Result<Vec<u8>, SnapshotError> {
        self.snapshot(host).to_bytes()
    }

    pub fn load_state(&mut self, host: &mut impl VbxeHost, data: &[u8]) -> Result<(), SnapshotError> {
        let snap = VbxeSnapshot::from_bytes(data)?;
        self.restore(host, &snap)
    }
}
