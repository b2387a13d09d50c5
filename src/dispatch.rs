//! Interrupt dispatch planning
//!
//! The dispatcher decides what to do from two register snapshots: the
//! device interrupt flags, and the EP0 interrupt flags. Keeping that decision
//! free of register access lets us test it without hardware.

use crate::ral::{DeviceInterrupt, Ueintx};
use bitflags::bitflags;

bitflags! {
    /// Work for the interrupt handler
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Actions: u8 {
        /// End of bus reset; reconfigure EP0
        const RESET = 1 << 0;
        /// Start of frame housekeeping
        const FRAME = 1 << 1;
        /// Capture a SETUP packet from EP0
        const SETUP = 1 << 2;
    }
}

/// Plan the interrupt handler's actions
///
/// The SETUP check looks only at EP0's flags, not at the device flags.
/// A bus reset reconfigures EP0, and that writes zero to its `UEINTX`
/// before the SETUP check would read it. So a SETUP flag observed alongside
/// a reset is already gone by the time it would be checked, and the plan
/// omits it. Skipping it here gives the same result as reading it again
/// after the reset.
pub fn plan(flags: DeviceInterrupt, ep0: Ueintx) -> Actions {
    let mut actions = Actions::empty();
    if flags.contains(DeviceInterrupt::EORST) {
        actions |= Actions::RESET;
    }
    if flags.contains(DeviceInterrupt::SOF) {
        actions |= Actions::FRAME;
    }
    if ep0.contains(Ueintx::RXSTPI) && !actions.contains(Actions::RESET) {
        actions |= Actions::SETUP;
    }
    actions
}
