//! Interrupt lines shared between chips.

/// Names the chip (or unit within a chip) driving an interrupt line.
///
/// Several sources may share one CPU input; the controller keeps the line
/// asserted while any source holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrqSource(pub &'static str);

/// A wired-OR interrupt controller.
pub trait IrqController {
    fn assert_irq(&mut self, source: IrqSource);
    fn negate_irq(&mut self, source: IrqSource);
}
