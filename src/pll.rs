//! USB PLL support

use crate::{
    ral::{Pllcsr, Pllfrq, Reg, Registers},
    timeout::Timeout,
    Error,
};

/// At or above this CPU clock, the PLL input is a 16MHz source that
/// needs the divide-by-two prescaler.
const PINDIV_THRESHOLD_HZ: u32 = 16_000_000;

/// Enable the PLL, and wait for lock
///
/// The PLL input prescaler is selected by the CPU frequency tier. A 16MHz
/// source runs the PLL at 96MHz, which is divided by 1.5 to produce the
/// 48MHz USB clock. Other sources use the reset PLL configuration.
pub fn initialize<R: Registers>(
    regs: &R,
    cpu_frequency: u32,
    lock: Timeout,
) -> Result<(), Error> {
    if cpu_frequency >= PINDIV_THRESHOLD_HZ {
        regs.set_bits(Reg::PLLCSR, Pllcsr::PINDIV.bits());
        regs.write(
            Reg::PLLFRQ,
            (Pllfrq::PLLUSB | Pllfrq::PDIV3 | Pllfrq::PDIV1).bits(),
        );
    }

    regs.set_bits(Reg::PLLCSR, Pllcsr::PLLE.bits());
    let locked = lock.wait(|| regs.has_bits(Reg::PLLCSR, Pllcsr::PLOCK.bits()));
    if locked.is_err() {
        warn!("PLL LOCK TIMEOUT");
    }
    locked
}
