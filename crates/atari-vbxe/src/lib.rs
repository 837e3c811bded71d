//! VideoBoard XE: a graphics coprocessor for the Atari 8-bit.
//!
//! The VBXE sits beside GTIA with 512K of its own memory. Each scanline a
//! display list (the XDL) configures an overlay plane and an attribute map
//! that recolours the GTIA playfield, and a blitter copies blocks around
//! local memory in whatever DMA time the display leaves free. The machine
//! feeds in GTIA's per-clock plane and playfield data and receives finished
//! 912-pixel RGB lines.

mod attr;
mod blitter;
mod changes;
mod compositor;
mod config;
mod memac;
mod memory;
mod overlay;
mod palette;
pub mod priority;
mod snapshot;
mod vbxe;
mod xdl;

pub use attr::{AttrPixel, HALF_CLOCKS};
pub use blitter::{
    BCB_SIZE, BLIT_LIST_MAX, BLIT_STOP_LATENCY, BUDGET_UNITS_PER_CYCLE, Bcb, BlitListing, BlitMode,
    Blitter, BlitterState, CYCLES_PER_LINE, LINE_BUDGET,
};
pub use changes::{ChangeQueue, RegisterChange};
pub use compositor::{COLOR_CLOCKS, Compositor, LINE_PIXELS};
pub use config::{CoreRevision, VbxeConfig};
pub use memac::{Layer, Memac, MemoryMap, PageMapping};
pub use memory::{ADDRESS_MASK, LOCAL_MEMORY_SIZE, LocalMemory};
pub use overlay::{Overlay, OverlayFlags};
pub use palette::{PALETTE_BANKS, Palettes};
pub use snapshot::{SnapshotError, VbxeSnapshot};
pub use vbxe::{BLIT_STOP_EVENT, BLITTER_IRQ, Vbxe, VbxeHost, VbxeStatus};
pub use xdl::{
    DisplayConfig, OverlayMode, OverlayWidth, XDL_HISTORY_LINES, XdlCursor, XdlHistoryEntry,
    XdlListing, XdlProcessor, XdlRecord,
};
