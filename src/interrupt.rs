//! Interrupt control
//!
//! The driver doesn't know how to mask interrupts, or how to install an
//! interrupt handler, on your MCU. You describe that with an
//! [`InterruptControl`] implementation.

use cortex_m::interrupt::CriticalSection;

/// USB interrupt lines
///
/// Both lines are serviced by the same handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    /// General USB interrupt (`USB_GEN`): reset, start of frame, suspend...
    General,
    /// Endpoint / pipe interrupt (`USB_COM`), including SETUP received
    Endpoint,
}

impl Irq {
    /// Returns the vector number of this interrupt line
    pub const fn vector(self) -> u8 {
        match self {
            Irq::General => 10,
            Irq::Endpoint => 11,
        }
    }
}

/// Global interrupt masking and interrupt handler registration
///
/// # Safety
///
/// After `disable()` returns, no interrupt may run until the paired call to
/// `restore()`. The driver relies on this to hand out critical section
/// tokens. `restore()` must put the interrupt enable state back to what it
/// was before the paired `disable()`, so that critical sections nest.
pub unsafe trait InterruptControl {
    /// The interrupt enable state captured by `disable()`
    type State;

    /// Disable all interrupts, returning the previous state
    fn disable(&self) -> Self::State;

    /// Restore the interrupt state captured by `disable()`
    fn restore(&self, state: Self::State);

    /// Route `irq` to `handler`
    fn register(&self, irq: Irq, handler: fn());
}

/// Restores the interrupt state when dropped
struct Restore<'a, I: InterruptControl> {
    ctrl: &'a I,
    state: Option<I::State>,
}

impl<I: InterruptControl> Drop for Restore<'_, I> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.ctrl.restore(state);
        }
    }
}

/// Execute `func` with all interrupts disabled
///
/// The interrupt state is restored on every path out of `func`.
pub fn free<I, R>(ctrl: &I, func: impl FnOnce(&CriticalSection) -> R) -> R
where
    I: InterruptControl,
{
    let _restore = Restore {
        ctrl,
        state: Some(ctrl.disable()),
    };
    // Safety: InterruptControl contract says that interrupts are
    // disabled until _restore drops.
    let cs = unsafe { CriticalSection::new() };
    func(&cs)
}
