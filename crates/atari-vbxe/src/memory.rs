//! VBXE local memory.
//!
//! 512K of SRAM sits behind the FX core. Every address the chip generates
//! (XDL fetches, overlay and attribute fetches, blitter reads and writes,
//! MEMAC window accesses) is 19 bits wide and wraps at the top.

pub const LOCAL_MEMORY_SIZE: usize = 0x8_0000;
pub const ADDRESS_MASK: u32 = 0x7_FFFF;

/// Reduce an address to the 19-bit local address space.
#[inline]
#[must_use]
pub const fn wrap(addr: u32) -> u32 {
    addr & ADDRESS_MASK
}

/// Step an address by a signed delta, wrapping at 512K.
#[inline]
#[must_use]
pub const fn offset(addr: u32, delta: i32) -> u32 {
    addr.wrapping_add_signed(delta) & ADDRESS_MASK
}

pub struct LocalMemory {
    bytes: Box<[u8]>,
    /// The machine treats this RAM as its own (e.g. as extended RAM) and
    /// saves it itself. The chip behaves identically either way; the flag
    /// only keeps the contents out of chip snapshots.
    shared: bool,
}

impl LocalMemory {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; LOCAL_MEMORY_SIZE].into_boxed_slice(),
            shared: false,
        }
    }

    pub fn new_shared() -> Self {
        Self {
            shared: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    #[inline]
    #[must_use]
    pub fn read(&self, addr: u32) -> u8 {
        self.bytes[wrap(addr) as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u32, value: u8) {
        self.bytes[wrap(addr) as usize] = value;
    }

    /// Read `N` consecutive bytes, wrapping at the top of memory.
    #[must_use]
    pub fn read_array<const N: usize>(&self, addr: u32) -> [u8; N] {
        std::array::from_fn(|i| self.read(addr.wrapping_add(i as u32)))
    }

    /// Copy `data` in starting at `addr`, wrapping at the top of memory.
    pub fn load(&mut self, addr: u32, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.write(addr.wrapping_add(i as u32), b);
        }
    }

    pub fn fill(&mut self, addr: u32, len: usize, value: u8) {
        for i in 0..len {
            self.write(addr.wrapping_add(i as u32), value);
        }
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Default for LocalMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accesses_wrap_at_512k() {
        let mut mem = LocalMemory::new();
        mem.write(0x8_0005, 0xAA);
        assert_eq!(mem.read(0x0005), 0xAA);
        assert_eq!(mem.read(0xFFF8_0005), 0xAA);
    }

    #[test]
    fn load_wraps_across_the_top() {
        let mut mem = LocalMemory::new();
        mem.load(0x7_FFFE, &[1, 2, 3, 4]);
        assert_eq!(mem.read(0x7_FFFE), 1);
        assert_eq!(mem.read(0x7_FFFF), 2);
        assert_eq!(mem.read(0), 3);
        assert_eq!(mem.read(1), 4);
        let bytes: [u8; 4] = mem.read_array(0x7_FFFE);
        assert_eq!(bytes, [1, 2, 3, 4]);
    }

    #[test]
    fn signed_offsets_wrap_both_ways() {
        assert_eq!(offset(0, -1), 0x7_FFFF);
        assert_eq!(offset(0x7_FFFF, 2), 1);
        assert_eq!(offset(0x100, -0x10), 0xF0);
    }
}
