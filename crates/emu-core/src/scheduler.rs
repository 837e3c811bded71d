//! Deferred events owned by the machine's scheduler.

use crate::Ticks;

/// Identifies one kind of deferred event.
///
/// Chips define their own ids as constants. The machine routes a fired
/// event back to whichever component owns the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u32);

/// A service that fires events after a delay.
///
/// Chips never advance time themselves. When a chip needs something to
/// happen later (an interrupt after a fixed latency, a timer underflow)
/// it asks the scheduler, and the machine calls back into the chip when
/// the delay has elapsed.
pub trait Scheduler {
    /// Fire `event` after `delay` ticks. Re-scheduling an event that is
    /// already pending replaces the earlier deadline.
    fn schedule(&mut self, delay: Ticks, event: EventId);

    /// Drop a pending event. Cancelling an event that is not pending does
    /// nothing.
    fn cancel(&mut self, event: EventId);

    /// Ticks left before `event` fires, or `None` if it is not pending.
    fn remaining(&self, event: EventId) -> Option<Ticks>;
}
