//! Mid-scanline GTIA register writes.
//!
//! The host queues writes to the colour and PRIOR registers with the
//! colour clock they happen at. Rendering stops at each queued position,
//! applies the write and carries on, so a raster split lands on exactly
//! the clock the CPU hit it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterChange {
    /// Colour clock the write takes effect at.
    pub position: u8,
    pub register: u8,
    pub value: u8,
}

/// Position-ordered queue. Writes at the same clock keep their order.
#[derive(Debug, Clone, Default)]
pub struct ChangeQueue {
    entries: Vec<RegisterChange>,
    /// Entries before this index have been applied.
    next: usize,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: u8, register: u8, value: u8) {
        // After the last entry at or before `position`, but never ahead of
        // anything already applied.
        let at = self.entries[self.next..]
            .partition_point(|e| e.position <= position)
            + self.next;
        self.entries.insert(
            at,
            RegisterChange {
                position,
                register,
                value,
            },
        );
    }

    /// Next unapplied change at or before colour clock `x`.
    pub fn pop_due(&mut self, x: usize) -> Option<RegisterChange> {
        let e = *self.entries.get(self.next)?;
        if usize::from(e.position) > x {
            return None;
        }
        self.next += 1;
        Some(e)
    }

    /// Position of the next unapplied change.
    #[must_use]
    pub fn next_position(&self) -> Option<usize> {
        self.entries.get(self.next).map(|e| usize::from(e.position))
    }

    /// Remove and return every unapplied change, in order.
    pub fn take_pending(&mut self) -> Vec<RegisterChange> {
        let pending = self.entries.split_off(self.next);
        self.clear();
        pending
    }

    #[must_use]
    pub fn pending(&self) -> &[RegisterChange] {
        &self.entries[self.next..]
    }

    /// Replace the queue with `pending`, none of it applied.
    pub fn restore(&mut self, pending: Vec<RegisterChange>) {
        self.entries = pending;
        self.next = 0;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() - self.next
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
