//! Core traits and types shared by the chip crates.
//!
//! Chips are written against these traits rather than against a concrete
//! machine, so each one can be driven by a test host as easily as by the
//! full system.

mod irq;
mod observable;
mod scheduler;
mod ticks;

pub use irq::{IrqController, IrqSource};
pub use observable::{Observable, Value, parse_address};
pub use scheduler::{EventId, Scheduler};
pub use ticks::Ticks;
