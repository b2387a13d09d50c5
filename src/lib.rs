//! A USB device driver for AVR USB microcontrollers
//!
//! `avr-usbd` drives the full-speed USB device controller found in parts
//! like the ATmega32U4. It brings up the USB PLL, attaches to the bus,
//! and services the USB interrupt: bus resets reconfigure the control
//! endpoint, and SETUP packets are captured and handed to your
//! [`SetupDecoder`]. You then respond to requests with the
//! [`Controller`]'s control transfer and data transfer methods.
//!
//! The driver is decoupled from the rest of the runtime:
//!
//! - register access goes through [`Registers`]. Use [`Mmio`] on hardware.
//! - interrupt masking and handler registration go through
//!   [`InterruptControl`], which you implement for your MCU.
//! - request decoding is up to the [`SetupDecoder`], typically your USB stack.
//!
//! Endpoint types are described with the [`usb-device`] vocabulary; see
//! [`EndpointConfig::new()`]. Control endpoints are supported; bulk and
//! interrupt endpoints are reserved.
//!
//! [`usb-device`]: https://crates.io/crates/usb-device

#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod buffer;
mod dispatch;
mod driver;
mod endpoint;
mod interrupt;
mod pll;
mod ral;
mod timeout;

#[cfg(test)]
mod fake;

pub use driver::{Config, Controller};
pub use endpoint::EndpointConfig;
pub use interrupt::{InterruptControl, Irq};
pub use ral::{Mmio, Reg, Registers};
pub use timeout::Timeout;

/// The size of a SETUP packet, in bytes
pub const SETUP_PACKET_LEN: usize = 8;

/// The size of a control OUT data packet, in bytes
///
/// This is the size of a CDC line coding structure.
pub const CONTROL_PACKET_LEN: usize = 7;

/// Receives SETUP packets from the interrupt handler
///
/// `decode()` runs in interrupt context, with the control endpoint
/// selected. Keep it short.
pub trait SetupDecoder {
    /// Handle one SETUP packet, in wire order
    fn decode(&self, packet: &[u8; SETUP_PACKET_LEN]);
}

impl<D: SetupDecoder + ?Sized> SetupDecoder for &D {
    fn decode(&self, packet: &[u8; SETUP_PACKET_LEN]) {
        (**self).decode(packet)
    }
}

// Safety: a shared reference is as good as the implementation it
// points at.
unsafe impl<I: InterruptControl + ?Sized> InterruptControl for &I {
    type State = I::State;
    fn disable(&self) -> Self::State {
        (**self).disable()
    }
    fn restore(&self, state: Self::State) {
        (**self).restore(state)
    }
    fn register(&self, irq: Irq, handler: fn()) {
        (**self).register(irq, handler)
    }
}

/// USB driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error {
    /// A busy-wait ran out of polls
    Timeout,
    /// The hardware rejected an endpoint configuration
    ConfigurationRejected,
    /// The request isn't supported by this driver
    Unsupported,
    /// A control OUT packet had the wrong size
    ReadSize {
        /// Bytes we wanted
        expected: usize,
        /// Bytes we received
        received: usize,
    },
    /// The endpoint can't accept a packet right now; try again
    WouldBlock,
    /// The endpoint doesn't exist
    InvalidEndpoint,
}

impl From<Error> for usb_device::UsbError {
    fn from(err: Error) -> Self {
        use usb_device::UsbError;
        match err {
            Error::Timeout | Error::WouldBlock => UsbError::WouldBlock,
            Error::ConfigurationRejected => UsbError::EndpointMemoryOverflow,
            Error::Unsupported => UsbError::Unsupported,
            Error::ReadSize { .. } => UsbError::InvalidState,
            Error::InvalidEndpoint => UsbError::InvalidEndpoint,
        }
    }
}
