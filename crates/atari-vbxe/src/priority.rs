//! GTIA priority logic and the VBXE playfield split.
//!
//! GTIA resolves up to eight simultaneous sources (PF0-PF3, P0-P3) into one
//! of 24 possible colours. The resolution depends only on PRIOR bits 0-4
//! and the set of active planes, so it is tabulated once per process.
//!
//! VBXE then splits every resolved colour into two parts: a channel of the
//! current attribute cell (which supplies PF0-PF2 on a VBXE display) and an
//! index into the GTIA colour table for whatever the attribute map does not
//! override. The two parts are ORed to form the palette index.

use std::sync::OnceLock;

/// Plane bits as they arrive from the host's merge buffer.
pub mod plane {
    pub const PF0: u8 = 0x01;
    pub const PF1: u8 = 0x02;
    pub const PF2: u8 = 0x04;
    pub const PF3: u8 = 0x08;
    pub const P0: u8 = 0x10;
    pub const P1: u8 = 0x20;
    pub const P2: u8 = 0x40;
    pub const P3: u8 = 0x80;

    pub const PF: u8 = PF0 | PF1 | PF2 | PF3;
    pub const PLAYERS: u8 = P0 | P1 | P2 | P3;
}

/// Indices into the 24-entry colour table.
pub mod color {
    pub const P0: u8 = 0;
    pub const P1: u8 = 1;
    pub const P2: u8 = 2;
    pub const P3: u8 = 3;
    pub const PF0: u8 = 4;
    pub const PF1: u8 = 5;
    pub const PF2: u8 = 6;
    pub const PF3: u8 = 7;
    pub const BAK: u8 = 8;
    pub const BLACK: u8 = 9;
    pub const P0P1: u8 = 10;
    pub const P2P3: u8 = 11;
    pub const PF0P0: u8 = 12;
    pub const PF0P1: u8 = 13;
    pub const PF0P0P1: u8 = 14;
    pub const PF1P0: u8 = 15;
    pub const PF1P1: u8 = 16;
    pub const PF1P0P1: u8 = 17;
    pub const PF2P2: u8 = 18;
    pub const PF2P3: u8 = 19;
    pub const PF2P2P3: u8 = 20;
    pub const PF3P2: u8 = 21;
    pub const PF3P3: u8 = 22;
    pub const PF3P2P3: u8 = 23;

    pub const COUNT: usize = 24;
}

/// Attribute cell channels, in cell order.
pub mod channel {
    /// Always zero: the colour comes entirely from the colour table.
    pub const NONE: u8 = 0;
    pub const PF0: u8 = 1;
    pub const PF1: u8 = 2;
    pub const PF2: u8 = 3;
}

/// One resolved pixel: attribute channel ORed with a colour-table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolve {
    pub channel: u8,
    pub color: u8,
}

impl Resolve {
    const fn new(channel: u8, color: u8) -> Self {
        Self { channel, color }
    }
}

pub struct PriorityTables {
    /// Plain GTIA resolution: `gtia[table][planes]` is a colour index.
    pub gtia: [[u8; 256]; 32],
    /// Split used for lores pixels, where PF0-PF2 come from the cell.
    pub split: [[Resolve; 256]; 32],
    /// Split used for hires pixels. Only PF1 and PF2 come from the cell;
    /// the PF0 channel is the PF2/PF3 selector in that mode.
    pub split_hires: [[Resolve; 256]; 32],
}

/// PRIOR bits 0-3 plus the multicolour player bit select one of 32 tables.
#[inline]
#[must_use]
pub const fn table_index(prior: u8) -> usize {
    (prior & 0x0F) as usize + if prior & 0x20 != 0 { 16 } else { 0 }
}

/// Shared tables, built on first use.
pub fn tables() -> &'static PriorityTables {
    static TABLES: OnceLock<Box<PriorityTables>> = OnceLock::new();
    TABLES.get_or_init(|| Box::new(build_tables()))
}

fn build_tables() -> PriorityTables {
    let mut gtia = [[0u8; 256]; 32];
    let mut split = [[Resolve::default(); 256]; 32];
    let mut split_hires = [[Resolve::default(); 256]; 32];

    for table in 0..32 {
        for planes in 0..256 {
            let c = gtia_resolve(table as u8, planes as u8);
            let (lo, hi) = split_color(c);
            gtia[table][planes] = c;
            split[table][planes] = lo;
            split_hires[table][planes] = hi;
        }
    }

    PriorityTables {
        gtia,
        split,
        split_hires,
    }
}

/// GTIA priority equations for one PRIOR table (bits 0-3 plus bit 4 as
/// MULTI) and one set of active planes.
///
/// ```text
/// SP0 = P0 * /(PF01*PRI23) * /(PRI2*PF23)
/// SP1 = P1 * /(PF01*PRI23) * /(PRI2*PF23) * (/P0 + MULTI)
/// SP2 = P2 * /P01 * /(PF23*PRI12) * /(PF01*/PRI0)
/// SP3 = P3 * /P01 * /(PF23*PRI12) * /(PF01*/PRI0) * (/P2 + MULTI)
/// SF0 = PF0 * /(P23*PRI0) * /(P01*PRI01) * /SF3
/// SF1 = PF1 * /(P23*PRI0) * /(P01*PRI01) * /SF3
/// SF2 = PF2 * /(P23*PRI03) * /(P01*/PRI2) * /SF3
/// SF3 = PF3 * /(P23*PRI03) * /(P01*/PRI2)
/// SB  = /P01 * /P23 * /PF01 * /PF23
/// ```
///
/// With all priority bits clear the logic does not produce black; players
/// 0-1 mix with playfields 0-1 and 3.
fn gtia_resolve(table: u8, planes: u8) -> u8 {
    let multi = table & 16 != 0;
    let pri0 = table & 1 != 0;
    let pri1 = table & 2 != 0;
    let pri2 = table & 4 != 0;
    let pri3 = table & 8 != 0;
    let pri01 = pri0 | pri1;
    let pri12 = pri1 | pri2;
    let pri23 = pri2 | pri3;
    let pri03 = pri0 | pri3;

    // ANTIC can only present one of PF0-PF2 at a time; PF3 is the one that
    // can clash because the fifth player drives it. Resolve towards the
    // higher playfield.
    const PF_REMAP: [u8; 8] = [0, 1, 2, 2, 4, 4, 4, 4];
    let v = PF_REMAP[(planes & 7) as usize];

    let pf0 = v & 1 != 0;
    let pf1 = v & 2 != 0;
    let pf2 = v & 4 != 0;
    let pf3 = planes & plane::PF3 != 0;
    let p0 = planes & plane::P0 != 0;
    let p1 = planes & plane::P1 != 0;
    let p2 = planes & plane::P2 != 0;
    let p3 = planes & plane::P3 != 0;

    let p01 = p0 | p1;
    let p23 = p2 | p3;
    let pf01 = pf0 | pf1;
    let pf23 = pf2 | pf3;

    let sp0 = p0 & !(pf01 & pri23) & !(pri2 & pf23);
    let sp1 = p1 & !(pf01 & pri23) & !(pri2 & pf23) & (!p0 | multi);
    let sp2 = p2 & !p01 & !(pf23 & pri12) & !(pf01 & !pri0);
    let sp3 = p3 & !p01 & !(pf23 & pri12) & !(pf01 & !pri0) & (!p2 | multi);

    let sf3 = pf3 & !(p23 & pri03) & !(p01 & !pri2);
    let sf2 = pf2 & !(p23 & pri03) & !(p01 & !pri2) & !sf3;
    let sf1 = pf1 & !(p23 & pri0) & !(p01 & pri01) & !sf3;
    let sf0 = pf0 & !(p23 & pri0) & !(p01 & pri01) & !sf3;

    let sb = !p01 & !p23 & !pf01 & !pf23;

    let out = u16::from(sf0)
        | u16::from(sf1) << 1
        | u16::from(sf2) << 2
        | u16::from(sf3) << 3
        | u16::from(sp0) << 4
        | u16::from(sp1) << 5
        | u16::from(sp2) << 6
        | u16::from(sp3) << 7
        | u16::from(sb) << 8;

    match out {
        0x001 => color::PF0,
        0x002 => color::PF1,
        0x004 => color::PF2,
        0x008 => color::PF3,
        0x010 => color::P0,
        0x011 => color::PF0P0,
        0x012 => color::PF1P0,
        0x020 => color::P1,
        0x021 => color::PF0P1,
        0x022 => color::PF1P1,
        0x030 => color::P0P1,
        0x031 => color::PF0P0P1,
        0x032 => color::PF1P0P1,
        0x040 => color::P2,
        0x044 => color::PF2P2,
        0x048 => color::PF3P2,
        0x080 => color::P3,
        0x084 => color::PF2P3,
        0x088 => color::PF3P3,
        0x0C0 => color::P2P3,
        0x0C4 => color::PF2P2P3,
        0x0C8 => color::PF3P2P3,
        0x100 => color::BAK,
        // Every other combination is a priority conflict with no output.
        _ => color::BLACK,
    }
}

/// Split a GTIA colour into (lores, hires) attribute-cell resolutions.
const fn split_color(c: u8) -> (Resolve, Resolve) {
    use channel::{NONE, PF0, PF1, PF2};

    match c {
        color::PF0 => (Resolve::new(PF0, color::BLACK), Resolve::new(NONE, color::PF0)),
        color::PF1 => (Resolve::new(PF1, color::BLACK), Resolve::new(PF1, color::BLACK)),
        color::PF2 => (Resolve::new(PF2, color::BLACK), Resolve::new(PF2, color::BLACK)),
        color::PF0P0 => (Resolve::new(PF0, color::P0), Resolve::new(NONE, color::PF0P0)),
        color::PF0P1 => (Resolve::new(PF0, color::P1), Resolve::new(NONE, color::PF0P1)),
        color::PF0P0P1 => (Resolve::new(PF0, color::P0P1), Resolve::new(NONE, color::PF0P0P1)),
        color::PF1P0 => (Resolve::new(PF1, color::P0), Resolve::new(PF1, color::P0)),
        color::PF1P1 => (Resolve::new(PF1, color::P1), Resolve::new(PF1, color::P1)),
        color::PF1P0P1 => (Resolve::new(PF1, color::P0P1), Resolve::new(PF1, color::P0P1)),
        color::PF2P2 => (Resolve::new(PF2, color::P2), Resolve::new(PF2, color::P2)),
        color::PF2P3 => (Resolve::new(PF2, color::P3), Resolve::new(PF2, color::P3)),
        color::PF2P2P3 => (Resolve::new(PF2, color::P2P3), Resolve::new(PF2, color::P2P3)),
        // Players, PF3 and its combinations, BAK and black stay GTIA colours.
        _ => (Resolve::new(NONE, c), Resolve::new(NONE, c)),
    }
}
