//! Palette RAM: four banks of 256 RGB entries.
//!
//! The CPU selects an entry with CSEL/PSEL and writes red, green and blue
//! in turn. Components are 7 bits wide on the DAC; the top bit is copied
//! into bit 0 so that $FE and $FF both give full intensity.

pub const PALETTE_BANKS: usize = 4;

#[derive(Clone)]
pub struct Palettes {
    /// Entries are 0x00RRGGBB.
    pub banks: [[u32; 256]; PALETTE_BANKS],
    /// Loaded into bank 0 on cold reset. The machine fills this with its
    /// (colour-corrected) GTIA palette.
    pub default: [u32; 256],
    pub csel: u8,
    pub psel: u8,
}

#[inline]
const fn expand(v: u8) -> u32 {
    ((v & 0xFE) | (v >> 7)) as u32
}

impl Palettes {
    pub fn new() -> Self {
        Self {
            banks: [[0; 256]; PALETTE_BANKS],
            default: [0; 256],
            csel: 0,
            psel: 0,
        }
    }

    pub fn cold_reset(&mut self) {
        self.banks[0] = self.default;
        for bank in &mut self.banks[1..] {
            bank.fill(0);
        }
        self.csel = 0;
        self.psel = 0;
    }

    #[inline]
    #[must_use]
    pub fn color(&self, bank: u8, index: u8) -> u32 {
        self.banks[(bank & 3) as usize][index as usize]
    }

    fn entry(&mut self) -> &mut u32 {
        &mut self.banks[(self.psel & 3) as usize][self.csel as usize]
    }

    pub fn write_red(&mut self, v: u8) {
        let e = self.entry();
        *e = (*e & 0x00_FFFF) | (expand(v) << 16);
    }

    pub fn write_green(&mut self, v: u8) {
        let e = self.entry();
        *e = (*e & 0xFF_00FF) | (expand(v) << 8);
    }

    /// Blue completes the entry and steps CSEL to the next colour.
    pub fn write_blue(&mut self, v: u8) {
        let e = self.entry();
        *e = (*e & 0xFF_FF00) | expand(v);
        self.csel = self.csel.wrapping_add(1);
    }
}

impl Default for Palettes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_writes_expand_seven_bit_components() {
        let mut p = Palettes::new();
        p.psel = 1;
        p.csel = 0x10;
        p.write_red(0xFE);
        p.write_green(0x80);
        p.write_blue(0x02);
        assert_eq!(p.color(1, 0x10), 0x00FF_8102);
        assert_eq!(p.csel, 0x11, "blue write steps CSEL");
    }

    #[test]
    fn csel_wraps_after_255() {
        let mut p = Palettes::new();
        p.csel = 0xFF;
        p.write_blue(0);
        assert_eq!(p.csel, 0);
    }

    #[test]
    fn cold_reset_reloads_bank_zero_only() {
        let mut p = Palettes::new();
        p.default[5] = 0x0012_3456;
        p.banks[2][7] = 0x00FF_FFFF;
        p.cold_reset();
        assert_eq!(p.color(0, 5), 0x0012_3456);
        assert_eq!(p.color(2, 7), 0);
    }
}
