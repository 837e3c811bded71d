//! Blitter - list-driven block copy engine.
//!
//! The CPU points BL_ADR at a list of 21-byte blit control blocks (BCBs)
//! and writes BLITTER_START. The blitter then works through the list on
//! its own, using whatever local-memory bandwidth the display leaves free
//! on each scanline. When a block without the "more" flag completes, the
//! blitter goes quiet and raises its interrupt a short, fixed time later.
//!
//! Bandwidth is kept as a signed balance of budget units, eight to a CPU
//! cycle. Each scanline credits the line's free units; each row of a blit
//! is executed whole and debited afterwards, so the balance can go
//! negative and is paid back from the next line's credit.

use std::fmt;

use emu_core::Ticks;
use serde::{Deserialize, Serialize};

use crate::memory::{self, LocalMemory};

pub const BCB_SIZE: usize = 21;

/// Budget units per CPU cycle.
pub const BUDGET_UNITS_PER_CYCLE: i32 = 8;
pub const CYCLES_PER_LINE: i32 = 114;
/// Units available on a scanline with no display DMA.
pub const LINE_BUDGET: i32 = BUDGET_UNITS_PER_CYCLE * CYCLES_PER_LINE;

/// Cycles between the last block finishing and the interrupt.
pub const BLIT_STOP_LATENCY: u64 = 4;

/// Blit lists are listed for inspection up to this many entries.
pub const BLIT_LIST_MAX: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlitMode {
    /// Unconditional write; the destination is never read.
    #[default]
    Copy,
    /// Write non-zero source bytes.
    Stencil,
    Add,
    Or,
    And,
    Xor,
    /// Each non-zero source nibble replaces the destination nibble.
    NibbleOverlay,
}

impl BlitMode {
    /// Control byte bits 0-2. The unused encoding 7 behaves as copy.
    #[must_use]
    pub const fn from_control(control: u8) -> Self {
        match control & 7 {
            1 => Self::Stencil,
            2 => Self::Add,
            3 => Self::Or,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::NibbleOverlay,
            _ => Self::Copy,
        }
    }

    #[must_use]
    pub const fn combine(self, c: u8, d: u8) -> u8 {
        match self {
            Self::Copy | Self::Stencil => c,
            // Carry out of bit 7 is dropped.
            Self::Add => c.wrapping_add(d),
            Self::Or => c | d,
            Self::And => c & d,
            Self::Xor => c ^ d,
            Self::NibbleOverlay => {
                let hi = if c & 0xF0 != 0 { c & 0xF0 } else { d & 0xF0 };
                let lo = if c & 0x0F != 0 { c & 0x0F } else { d & 0x0F };
                hi | lo
            }
        }
    }
}

/// Blit control block.
///
/// ```text
///  0-2  source address        3-4  source Y step (13-bit signed)
///  5    source X step (i8)     6-8  destination address
///  9-10 dest Y step            11   dest X step
/// 12-13 width - 1 (9 bits)     14   height - 1
/// 15    AND mask               16   XOR mask
/// 17    collision mask         18   zoom: Y-1 in bits 4-6, X-1 in bits 0-2
/// 19    pattern: bit 7 enable, bits 0-5 period - 1
/// 20    control: bits 0-2 mode, bit 3 more blits follow
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bcb {
    pub source: u32,
    pub source_step_y: i32,
    pub source_step_x: i32,
    pub dest: u32,
    pub dest_step_y: i32,
    pub dest_step_x: i32,
    pub width: u32,
    pub height: u32,
    pub and_mask: u8,
    pub xor_mask: u8,
    pub collision_mask: u8,
    pub zoom_x: u32,
    pub zoom_y: u32,
    /// Source wraps back to the row start after this many bytes.
    pub pattern: Option<u32>,
    pub mode: BlitMode,
    pub more: bool,
}

fn sign_extend_13(v: u16) -> i32 {
    (i32::from(v & 0x1FFF) << 19) >> 19
}

impl Bcb {
    #[must_use]
    pub fn decode(raw: &[u8; BCB_SIZE]) -> Self {
        let addr = |i: usize| {
            u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], 0]) & memory::ADDRESS_MASK
        };
        let step_y = |i: usize| sign_extend_13(u16::from_le_bytes([raw[i], raw[i + 1]]));

        Self {
            source: addr(0),
            source_step_y: step_y(3),
            source_step_x: i32::from(raw[5] as i8),
            dest: addr(6),
            dest_step_y: step_y(9),
            dest_step_x: i32::from(raw[11] as i8),
            width: u32::from(raw[12]) + (u32::from(raw[13] & 1) << 8) + 1,
            height: u32::from(raw[14]) + 1,
            and_mask: raw[15],
            xor_mask: raw[16],
            collision_mask: raw[17],
            zoom_x: u32::from(raw[18] & 7) + 1,
            zoom_y: u32::from((raw[18] >> 4) & 7) + 1,
            pattern: (raw[19] & 0x80 != 0).then(|| u32::from(raw[19] & 0x3F) + 1),
            mode: BlitMode::from_control(raw[20]),
            more: raw[20] & 0x08 != 0,
        }
    }

    #[must_use]
    pub fn read(mem: &LocalMemory, addr: u32) -> Self {
        Self::decode(&mem.read_array(addr))
    }

    /// Destination bytes touched per row.
    #[must_use]
    pub fn row_bytes(&self) -> u32 {
        self.width * self.zoom_x
    }

    /// Whether each written byte costs a destination read first. Stencil
    /// only needs the old byte when there is something to collide with,
    /// and a zero AND mask turns it into a constant fill.
    #[must_use]
    pub const fn reads_destination(&self) -> bool {
        match self.mode {
            BlitMode::Copy => false,
            BlitMode::Stencil => self.and_mask != 0 && self.collision_mask != 0,
            _ => true,
        }
    }

    /// Nominal budget units per row, before zero-byte savings.
    #[must_use]
    pub fn row_cost(&self) -> i32 {
        let bytes = self.row_bytes() as i32;
        let mut cost = bytes;
        if self.and_mask != 0 {
            cost += bytes;
        }
        if self.reads_destination() {
            cost += bytes;
        }
        cost
    }
}

impl fmt::Display for Bcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "src ${:05X} ({:+},{:+}) dst ${:05X} ({:+},{:+}) {}x{} and ${:02X} xor ${:02X} coll ${:02X} zoom {}x{}",
            self.source,
            self.source_step_x,
            self.source_step_y,
            self.dest,
            self.dest_step_x,
            self.dest_step_y,
            self.width,
            self.height,
            self.and_mask,
            self.xor_mask,
            self.collision_mask,
            self.zoom_x,
            self.zoom_y,
        )?;
        if let Some(p) = self.pattern {
            write!(f, " pattern {p}")?;
        }
        write!(f, " {:?}", self.mode)?;
        if self.more {
            write!(f, " +more")?;
        }
        Ok(())
    }
}

/// A blit list decoded from memory for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlitListing {
    pub entries: Vec<(u32, Bcb)>,
    /// The list was still asking for more at the entry limit.
    pub truncated: bool,
}

impl BlitListing {
    #[must_use]
    pub fn decode(mem: &LocalMemory, list: u32) -> Self {
        let mut entries = Vec::new();
        let mut addr = memory::wrap(list);
        while entries.len() < BLIT_LIST_MAX {
            let bcb = Bcb::read(mem, addr);
            entries.push((addr, bcb));
            if !bcb.more {
                return Self {
                    entries,
                    truncated: false,
                };
            }
            addr = memory::wrap(addr + BCB_SIZE as u32);
        }
        Self {
            entries,
            truncated: true,
        }
    }
}

impl fmt::Display for BlitListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (addr, bcb) in &self.entries {
            writeln!(f, "{addr:05X}: {bcb}")?;
        }
        if self.truncated {
            writeln!(f, "; listing stopped after {BLIT_LIST_MAX} entries")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlitterState {
    #[default]
    Stopped,
    /// Between blocks: the next BCB is fetched when budget allows.
    Reload,
    ProcessBlit,
    /// Out of work, waiting out the interrupt latency.
    Stopping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blitter {
    pub state: BlitterState,
    pub list_address: u32,
    pub fetch_address: u32,
    /// Block in progress. Source and destination advance row by row.
    pub bcb: Bcb,
    pub rows_left: u32,
    pub zoom_counter_y: u32,
    pub row_cost: i32,
    /// Collision bits still able to fire; cleared by the first hit.
    pub armed_mask: u8,
    pub collision_code: u8,
    pub balance: i32,
    #[serde(skip)]
    pub log: bool,
}

impl Blitter {
    pub fn new() -> Self {
        Self {
            state: BlitterState::Stopped,
            list_address: 0,
            fetch_address: 0,
            bcb: Bcb::default(),
            rows_left: 0,
            zoom_counter_y: 0,
            row_cost: 0,
            armed_mask: 0,
            collision_code: 0,
            balance: 0,
            log: false,
        }
    }

    /// Everything but the list address and logging flag back to idle.
    pub fn reset(&mut self) {
        *self = Self {
            list_address: self.list_address,
            log: self.log,
            ..Self::new()
        };
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != BlitterState::Stopped
    }

    /// BLITTER_BUSY: bit 1 busy, bit 0 working through the list.
    #[must_use]
    pub fn status(&self) -> u8 {
        match self.state {
            BlitterState::Stopped => 0x00,
            BlitterState::Reload => 0x01,
            BlitterState::ProcessBlit => 0x03,
            BlitterState::Stopping => 0x02,
        }
    }

    /// Start the list. The first block is loaded straight away; software
    /// commonly rewrites the list as soon as the start write completes.
    /// Returns `false` if the blitter was already running.
    pub fn start(&mut self, mem: &LocalMemory) -> bool {
        if self.is_busy() {
            return false;
        }
        self.fetch_address = self.list_address;
        self.load(mem);
        true
    }

    /// Returns `true` if a pending stop event must be cancelled.
    pub fn stop(&mut self) -> bool {
        let pending = self.state == BlitterState::Stopping;
        self.state = BlitterState::Stopped;
        self.balance = 0;
        pending
    }

    /// Stop latency has elapsed. Returns `true` if the interrupt should be
    /// raised.
    pub fn finish_stop(&mut self) -> bool {
        if self.state != BlitterState::Stopping {
            return false;
        }
        self.state = BlitterState::Stopped;
        true
    }

    pub fn credit(&mut self, units: i32) {
        self.balance += units;
    }

    /// Run while the balance is positive. Returns the delay to schedule
    /// if the blitter ran out of work and entered `Stopping`.
    pub fn run(&mut self, mem: &mut LocalMemory) -> Option<Ticks> {
        let start_balance = self.balance;

        while self.balance > 0 {
            match self.state {
                BlitterState::Stopped | BlitterState::Stopping => break,
                BlitterState::Reload => {
                    if !self.bcb.more {
                        let consumed = (start_balance - self.balance).max(0) as u64;
                        let cycles = consumed.div_ceil(BUDGET_UNITS_PER_CYCLE as u64);
                        self.state = BlitterState::Stopping;
                        self.balance = 0;
                        return Some(Ticks::new(cycles + BLIT_STOP_LATENCY));
                    }
                    self.load(mem);
                }
                BlitterState::ProcessBlit => {
                    let cost = self.run_row(mem);
                    self.balance -= cost;
                }
            }
        }

        if matches!(self.state, BlitterState::Stopped | BlitterState::Stopping) {
            self.balance = 0;
        }
        None
    }

    fn load(&mut self, mem: &LocalMemory) {
        let addr = self.fetch_address;
        let bcb = Bcb::read(mem, addr);
        if self.log {
            log::debug!(target: "vbxe::blit", "blit at ${addr:05X}: {bcb}");
        }

        self.fetch_address = memory::wrap(addr + BCB_SIZE as u32);
        self.bcb = bcb;
        self.rows_left = bcb.height;
        self.zoom_counter_y = 0;
        self.row_cost = bcb.row_cost();
        self.armed_mask = bcb.collision_mask;
        self.collision_code = 0;
        self.balance -= BCB_SIZE as i32;
        self.state = BlitterState::ProcessBlit;
    }

    /// Execute one destination row; returns its budget cost.
    fn run_row(&mut self, mem: &mut LocalMemory) -> i32 {
        let bcb = self.bcb;
        let zoom_step = bcb.dest_step_x * bcb.zoom_x as i32;
        let reads = bcb.reads_destination();
        let period = bcb.pattern.unwrap_or(u32::MAX);

        let mut src = bcb.source;
        let mut dst = bcb.dest;
        let mut pattern_left = period;
        let mut skipped = 0;

        for _ in 0..bcb.width {
            let c = (mem.read(src) & bcb.and_mask) ^ bcb.xor_mask;

            if bcb.mode == BlitMode::Copy {
                for _ in 0..bcb.zoom_x {
                    mem.write(dst, c);
                    dst = memory::offset(dst, bcb.dest_step_x);
                }
            } else if c == 0 {
                // Nothing to write, so the read-before-write is skipped too.
                dst = memory::offset(dst, zoom_step);
                if reads {
                    skipped += bcb.zoom_x as i32;
                }
            } else {
                for _ in 0..bcb.zoom_x {
                    let d = mem.read(dst);
                    self.detect_collision(c, d);
                    mem.write(dst, bcb.mode.combine(c, d));
                    dst = memory::offset(dst, bcb.dest_step_x);
                }
            }

            src = memory::offset(src, bcb.source_step_x);
            pattern_left -= 1;
            if pattern_left == 0 {
                pattern_left = period;
                src = bcb.source;
            }
        }

        self.bcb.dest = memory::offset(bcb.dest, bcb.dest_step_y);
        self.zoom_counter_y += 1;
        if self.zoom_counter_y >= bcb.zoom_y {
            self.zoom_counter_y = 0;
            self.bcb.source = memory::offset(bcb.source, bcb.source_step_y);
            self.rows_left -= 1;
            if self.rows_left == 0 {
                self.state = BlitterState::Reload;
            }
        }

        self.row_cost - skipped
    }

    fn detect_collision(&mut self, c: u8, d: u8) {
        if self.armed_mask == 0 {
            return;
        }
        let armed = |bit: u8| self.armed_mask & (1 << bit) != 0;
        let hit = if self.bcb.mode == BlitMode::NibbleOverlay {
            (c & 0x0F != 0 && d & 0x0F != 0 && armed((d >> 1) & 7))
                || (c & 0xF0 != 0 && d & 0xF0 != 0 && armed(d >> 5))
        } else {
            d != 0 && armed(d >> 5)
        };
        if hit {
            self.collision_code = d;
            self.armed_mask = 0;
        }
    }
}

impl Default for Blitter {
    fn default() -> Self {
        Self::new()
    }
}
