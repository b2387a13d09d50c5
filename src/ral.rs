//! Register access layer for the USB controller, clock and PLL registers
//!
//! Every register the driver touches is named by a [`Reg`], which knows its
//! fixed data-space address. The bit layout of each register is described
//! by a `bitflags` type named after the register. The driver never touches
//! an address directly; it goes through a [`Registers`] implementation,
//! which is [`Mmio`] on hardware.
//!
//! Endpoint registers (`UECONX` through `UEBCLX`) are banked: they describe
//! the endpoint currently selected by `UENUM`.

use bitflags::bitflags;
use ral_registers::RWRegister;

/// A USB controller register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Reg {
    PLLCSR,
    PLLFRQ,
    UHWCON,
    USBCON,
    UDCON,
    UDINT,
    UDIEN,
    UDADDR,
    UEINTX,
    UENUM,
    UECONX,
    UECFG0X,
    UECFG1X,
    UESTA0X,
    UEIENX,
    UEDATX,
    UEBCLX,
}

impl Reg {
    /// Returns the data-space address of the register
    pub const fn address(self) -> usize {
        match self {
            Reg::PLLCSR => 0x49,
            Reg::PLLFRQ => 0x52,
            Reg::UHWCON => 0xD7,
            Reg::USBCON => 0xD8,
            Reg::UDCON => 0xE0,
            Reg::UDINT => 0xE1,
            Reg::UDIEN => 0xE2,
            Reg::UDADDR => 0xE3,
            Reg::UEINTX => 0xE8,
            Reg::UENUM => 0xE9,
            Reg::UECONX => 0xEB,
            Reg::UECFG0X => 0xEC,
            Reg::UECFG1X => 0xED,
            Reg::UESTA0X => 0xEE,
            Reg::UEIENX => 0xF0,
            Reg::UEDATX => 0xF1,
            Reg::UEBCLX => 0xF2,
        }
    }

    /// Indicates if the register is banked by the endpoint number in `UENUM`
    pub const fn is_endpoint_register(self) -> bool {
        matches!(
            self,
            Reg::UEINTX
                | Reg::UECONX
                | Reg::UECFG0X
                | Reg::UECFG1X
                | Reg::UESTA0X
                | Reg::UEIENX
                | Reg::UEDATX
                | Reg::UEBCLX
        )
    }
}

/// Byte-wide register operations
///
/// `read` and `write` are the only required methods. The bit helpers
/// are read-modify-write sequences built on top of them; they are not
/// atomic with respect to interrupts.
pub trait Registers {
    /// Read the register
    fn read(&self, reg: Reg) -> u8;
    /// Write `value` to the register
    fn write(&self, reg: Reg, value: u8);

    /// Set every bit in `bits`, leaving the other bits unchanged
    fn set_bits(&self, reg: Reg, bits: u8) {
        let value = self.read(reg);
        self.write(reg, value | bits);
    }

    /// Clear every bit in `bits`, leaving the other bits unchanged
    fn clear_bits(&self, reg: Reg, bits: u8) {
        let value = self.read(reg);
        self.write(reg, value & !bits);
    }

    /// Indicates if all of `bits` are set
    fn has_bits(&self, reg: Reg, bits: u8) -> bool {
        self.read(reg) & bits == bits
    }
}

impl<R: Registers + ?Sized> Registers for &R {
    fn read(&self, reg: Reg) -> u8 {
        (**self).read(reg)
    }
    fn write(&self, reg: Reg, value: u8) {
        (**self).write(reg, value)
    }
}

/// Memory-mapped register access
///
/// Each [`Reg`] address is treated as a volatile, byte-wide register.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Acquire the memory-mapped USB registers
    ///
    /// # Safety
    ///
    /// The [`Reg`] addresses must describe this MCU's USB controller. There
    /// should only be one `Mmio` per USB peripheral, and nothing else should
    /// be touching these registers.
    pub const unsafe fn new() -> Self {
        Mmio { _private: () }
    }

    fn register(reg: Reg) -> &'static RWRegister<u8> {
        // Safety: Mmio::new() contract says that the address is a valid
        // byte register, and that we're the only user.
        unsafe { &*(reg.address() as *const RWRegister<u8>) }
    }
}

impl Registers for Mmio {
    #[inline(always)]
    fn read(&self, reg: Reg) -> u8 {
        Self::register(reg).read()
    }
    #[inline(always)]
    fn write(&self, reg: Reg, value: u8) {
        Self::register(reg).write(value)
    }
}

bitflags! {
    /// PLL control and status
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pllcsr: u8 {
        /// Divide a 16MHz clock source by two
        const PINDIV = 1 << 4;
        const PLLE = 1 << 1;
        const PLOCK = 1 << 0;
    }

    /// PLL frequency control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pllfrq: u8 {
        const PINMUX = 1 << 7;
        /// Divide the PLL output by 1.5 for the USB module
        const PLLUSB = 1 << 6;
        const PLLTM1 = 1 << 5;
        const PLLTM0 = 1 << 4;
        const PDIV3 = 1 << 3;
        const PDIV2 = 1 << 2;
        const PDIV1 = 1 << 1;
        const PDIV0 = 1 << 0;
    }

    /// USB hardware configuration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Uhwcon: u8 {
        /// USB pad regulator enable
        const UVREGE = 1 << 0;
    }

    /// USB general control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Usbcon: u8 {
        const USBE = 1 << 7;
        const FRZCLK = 1 << 5;
        const OTGPADE = 1 << 4;
        const VBUSTE = 1 << 0;
    }

    /// USB device control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Udcon: u8 {
        /// Low speed mode
        const LSM = 1 << 2;
        const RMWKUP = 1 << 1;
        const DETACH = 1 << 0;
    }

    /// USB device interrupt flags (`UDINT`) and enables (`UDIEN`)
    ///
    /// The two registers share a layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceInterrupt: u8 {
        const UPRSM = 1 << 6;
        const EORSM = 1 << 5;
        const WAKEUP = 1 << 4;
        /// End of reset
        const EORST = 1 << 3;
        /// Start of frame
        const SOF = 1 << 2;
        const SUSP = 1 << 0;
    }

    /// USB device address
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Udaddr: u8 {
        const ADDEN = 1 << 7;
        const UADD = 0x7F;
    }

    /// Endpoint control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ueconx: u8 {
        const STALLRQ = 1 << 5;
        const STALLRQC = 1 << 4;
        const RSTDT = 1 << 3;
        const EPEN = 1 << 0;
    }

    /// Endpoint configuration 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Uecfg0x: u8 {
        const EPTYPE1 = 1 << 7;
        const EPTYPE0 = 1 << 6;
        const EPTYPE = Self::EPTYPE1.bits() | Self::EPTYPE0.bits();
        /// Set for IN endpoints
        const EPDIR = 1 << 0;
    }

    /// Endpoint configuration 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Uecfg1x: u8 {
        const EPSIZE2 = 1 << 6;
        const EPSIZE1 = 1 << 5;
        const EPSIZE0 = 1 << 4;
        const EPBK1 = 1 << 3;
        const EPBK0 = 1 << 2;
        const ALLOC = 1 << 1;
    }

    /// Endpoint status 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Uesta0x: u8 {
        /// Configuration accepted
        const CFGOK = 1 << 7;
        const OVERFI = 1 << 6;
        const UNDERFI = 1 << 5;
    }

    /// Endpoint interrupt flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ueintx: u8 {
        const FIFOCON = 1 << 7;
        const NAKINI = 1 << 6;
        /// Read / write allowed
        const RWAL = 1 << 5;
        const NAKOUTI = 1 << 4;
        /// SETUP received
        const RXSTPI = 1 << 3;
        /// OUT data received
        const RXOUTI = 1 << 2;
        const STALLEDI = 1 << 1;
        /// Transmitter ready
        const TXINI = 1 << 0;
    }

    /// Endpoint interrupt enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ueienx: u8 {
        const FLERRE = 1 << 7;
        const NAKINE = 1 << 6;
        const NAKOUTE = 1 << 4;
        const RXSTPE = 1 << 3;
        const RXOUTE = 1 << 2;
        const STALLEDE = 1 << 1;
        const TXINE = 1 << 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Reg, Registers, Uecfg1x, Ueintx};
    use core::cell::Cell;

    struct One(Cell<u8>);

    impl Registers for One {
        fn read(&self, _: Reg) -> u8 {
            self.0.get()
        }
        fn write(&self, _: Reg, value: u8) {
            self.0.set(value)
        }
    }

    #[test]
    fn bit_helpers() {
        let reg = One(Cell::new(0b1000_0001));
        reg.set_bits(Reg::UEINTX, Ueintx::RXSTPI.bits());
        assert_eq!(reg.read(Reg::UEINTX), 0b1000_1001);
        assert!(reg.has_bits(Reg::UEINTX, 0b1000_1000));
        assert!(!reg.has_bits(Reg::UEINTX, 0b1100_0000));

        reg.clear_bits(Reg::UEINTX, 0b1000_0000);
        assert_eq!(reg.read(Reg::UEINTX), 0b0000_1001);
    }

    #[test]
    fn control_bank_layout() {
        let bits = Uecfg1x::EPSIZE1 | Uecfg1x::EPSIZE0 | Uecfg1x::ALLOC;
        assert_eq!(bits.bits(), 0x32);
    }

    #[test]
    fn banked_registers() {
        assert!(Reg::UEDATX.is_endpoint_register());
        assert!(Reg::UEINTX.is_endpoint_register());
        assert!(!Reg::UENUM.is_endpoint_register());
        assert!(!Reg::UDINT.is_endpoint_register());
    }
}
