//! MEMAC: the two CPU windows into local memory.
//!
//! Window A is programmable in position and size; window B is fixed at
//! $4000-$7FFF in 16K banks. Each window can be opened to the CPU, to
//! ANTIC, or both. The chip does not decode CPU addresses itself; it tells
//! the machine's memory map which pages to route here.

use serde::{Deserialize, Serialize};

/// Pages of the CPU address space the chip claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// The register page ($D6xx or $D7xx).
    Registers,
    /// Write-only snoop on the GTIA page, used to spot warm resets.
    GtiaShadow,
    WindowA,
    WindowB,
}

/// Where a layer sits and who can see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMapping {
    pub first_page: u8,
    pub pages: u16,
    /// Local address of the first mapped byte. Zero for register layers.
    pub local_base: u32,
    pub cpu: bool,
    pub antic: bool,
}

impl PageMapping {
    #[must_use]
    pub fn contains(&self, addr: u16) -> bool {
        let page = u16::from(self.first_page);
        let p = addr >> 8;
        p >= page && p < page + self.pages
    }

    /// Local address for CPU address `addr`, which must be inside the
    /// mapping.
    #[must_use]
    pub fn translate(&self, addr: u16) -> u32 {
        let start = u32::from(self.first_page) << 8;
        self.local_base + (u32::from(addr) - start)
    }
}

/// The machine's memory map, as seen by the chip.
pub trait MemoryMap {
    /// Install, move or (with `None`) remove a layer.
    fn map_layer(&mut self, layer: Layer, mapping: Option<PageMapping>);
}

const WINDOW_A_PAGES: [u16; 4] = [16, 32, 64, 128];
const WINDOW_A_MASK: [u32; 4] = [0x7_F000, 0x7_E000, 0x7_C000, 0x7_8000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Memac {
    /// MEMAC_CONTROL: base page in bits 4-7, CPU enable bit 3, ANTIC
    /// enable bit 2, size in bits 0-1.
    pub control: u8,
    /// MEMAC_BANK_SEL: bit 7 enables window A.
    pub bank_a: u8,
    /// MEMAC_B_CONTROL: CPU enable bit 7, ANTIC enable bit 6, bank in
    /// bits 0-4.
    pub bank_b: u8,
}

impl Memac {
    #[must_use]
    pub fn window_a(&self, mode_5200: bool) -> Option<PageMapping> {
        if mode_5200 {
            return Some(PageMapping {
                first_page: 0xD8,
                pages: 16,
                local_base: (u32::from(self.bank_a) << 12) & 0x7_F000,
                cpu: true,
                antic: true,
            });
        }

        if self.bank_a & 0x80 == 0 || self.control & 0x0C == 0 {
            return None;
        }

        let size = (self.control & 3) as usize;
        let first_page = self.control & 0xF0;
        // Clipped at the top of the address space rather than wrapping.
        let pages = WINDOW_A_PAGES[size].min(0x100 - u16::from(first_page));

        Some(PageMapping {
            first_page,
            pages,
            local_base: (u32::from(self.bank_a) << 12) & WINDOW_A_MASK[size],
            cpu: self.control & 0x08 != 0,
            antic: self.control & 0x04 != 0,
        })
    }

    #[must_use]
    pub fn window_b(&self, mode_5200: bool) -> Option<PageMapping> {
        if mode_5200 || self.bank_b & 0xC0 == 0 {
            return None;
        }
        Some(PageMapping {
            first_page: 0x40,
            pages: 0x40,
            local_base: u32::from(self.bank_b & 0x1F) << 14,
            cpu: self.bank_b & 0x80 != 0,
            antic: self.bank_b & 0x40 != 0,
        })
    }

    /// Drop the window enables, keeping bank numbers and sizes.
    pub fn warm_reset(&mut self) {
        self.control &= 0xF3;
        self.bank_a &= 0x7F;
        self.bank_b &= 0x3F;
    }

    /// Local address seen by the CPU (or ANTIC) at `addr`. Window A wins
    /// where the two overlap.
    #[must_use]
    pub fn resolve(&self, addr: u16, mode_5200: bool, antic: bool) -> Option<u32> {
        [self.window_a(mode_5200), self.window_b(mode_5200)]
            .into_iter()
            .flatten()
            .find(|m| m.contains(addr) && if antic { m.antic } else { m.cpu })
            .map(|m| m.translate(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_a_needs_bank_enable_and_an_access_bit() {
        let mut m = Memac {
            control: 0x90 | 0x08,
            bank_a: 0x05,
            bank_b: 0,
        };
        assert_eq!(m.window_a(false), None);
        m.bank_a |= 0x80;
        let w = m.window_a(false).expect("window open");
        assert_eq!(w.first_page, 0x90);
        assert_eq!(w.pages, 16);
        assert_eq!(w.local_base, 0x0_5000);
        assert!(w.cpu);
        assert!(!w.antic);
        m.control &= !0x0C;
        assert_eq!(m.window_a(false), None);
    }

    #[test]
    fn window_a_bank_is_masked_to_its_size() {
        let m = Memac {
            control: 0x40 | 0x0C | 0x02,
            bank_a: 0x80 | 0x07,
            bank_b: 0,
        };
        let w = m.window_a(false).expect("window open");
        assert_eq!(w.pages, 64);
        assert_eq!(w.local_base, 0x0_4000, "16K window drops the low two bank bits");
    }

    #[test]
    fn window_a_is_clipped_at_the_top_of_memory() {
        let m = Memac {
            control: 0xF0 | 0x08 | 0x03,
            bank_a: 0x80,
            bank_b: 0,
        };
        let w = m.window_a(false).expect("window open");
        assert_eq!(w.pages, 16);
        assert!(w.contains(0xFFFF));
        assert!(!w.contains(0x0000));
    }

    #[test]
    fn window_b_maps_16k_banks_at_4000() {
        let m = Memac {
            control: 0,
            bank_a: 0,
            bank_b: 0x80 | 0x03,
        };
        let w = m.window_b(false).expect("window open");
        assert_eq!(w.local_base, 0x0_C000);
        assert!(w.cpu);
        assert!(!w.antic);
        assert_eq!(m.resolve(0x4001, false, false), Some(0x0_C001));
        assert_eq!(m.resolve(0x4001, false, true), None, "ANTIC not enabled");
        assert_eq!(m.window_b(true), None, "no window B on the 5200");
    }

    #[test]
    fn window_a_takes_priority_over_b() {
        let m = Memac {
            control: 0x40 | 0x08,
            bank_a: 0x80 | 0x10,
            bank_b: 0x80,
        };
        assert_eq!(m.resolve(0x4010, false, false), Some(0x1_0010));
        assert_eq!(m.resolve(0x5010, false, false), Some(0x0_1010));
    }

    #[test]
    fn mode_5200_fixes_window_a() {
        let m = Memac {
            control: 0,
            bank_a: 0x23,
            bank_b: 0,
        };
        let w = m.window_a(true).expect("always open on the 5200");
        assert_eq!(w.first_page, 0xD8);
        assert_eq!(w.local_base, 0x2_3000);
        assert_eq!(m.resolve(0xE7FF, true, false), Some(0x2_3FFF));
    }

    #[test]
    fn warm_reset_clears_enables_only() {
        let mut m = Memac {
            control: 0xFF,
            bank_a: 0xFF,
            bank_b: 0xFF,
        };
        m.warm_reset();
        assert_eq!(m.control, 0xF3);
        assert_eq!(m.bank_a, 0x7F);
        assert_eq!(m.bank_b, 0x3F);
    }
}
