//! USB device controller driver
//!
//! One [`Controller`] drives one USB peripheral. Its methods take `&self`, so
//! the same controller is reachable from your interrupt handler and from
//! mainline code. Typically, that means a `static`:
//!
//! ```no_run
//! use avr_usbd::{Config, Controller, Irq, InterruptControl, Mmio, SetupDecoder};
//!
//! # struct Avr;
//! # unsafe impl InterruptControl for Avr {
//! #     type State = u8;
//! #     fn disable(&self) -> u8 { 0 }
//! #     fn restore(&self, _: u8) {}
//! #     fn register(&self, _: Irq, _: fn()) {}
//! # }
//! # struct Requests;
//! # impl SetupDecoder for Requests { fn decode(&self, _: &[u8; 8]) {} }
//! // Safety: the only Mmio for the USB peripheral.
//! static USB: Controller<Mmio, Avr, Requests> =
//!     Controller::new(unsafe { Mmio::new() }, Avr, Requests);
//!
//! fn usb_isr() {
//!     USB.on_interrupt();
//! }
//!
//! USB.configure(&Config::default(), usb_isr).unwrap();
//! ```

use crate::{
    buffer::{Caches, ENDPOINT_COUNT},
    dispatch::{self, Actions},
    endpoint::{Endpoint, EndpointConfig},
    interrupt::{self, InterruptControl, Irq},
    pll,
    ral::{DeviceInterrupt, Reg, Registers, Udaddr, Udcon, Uhwcon, Usbcon},
    timeout::Timeout,
    Error, SetupDecoder, CONTROL_PACKET_LEN,
};
use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
};
use cortex_m::interrupt::Mutex;

/// Controller bring-up settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The CPU clock, in Hz
    ///
    /// Selects the PLL input prescaler.
    pub cpu_frequency: u32,
    /// How long to wait for PLL lock
    ///
    /// Use [`Timeout::unbounded()`] to wait forever.
    pub pll_lock: Timeout,
}

impl Default for Config {
    /// A 16MHz CPU, with a bounded PLL lock wait
    fn default() -> Self {
        Config {
            cpu_frequency: 16_000_000,
            pll_lock: Timeout::PLL_LOCK,
        }
    }
}

/// A USB device controller
///
/// After you create a `Controller` with [`new()`](Controller::new), you must
/// call [`configure()`](Controller::configure) to bring up the peripheral
/// and attach to the bus. The host then resets the bus, and the interrupt
/// handler prepares EP0. SETUP packets are handed to your [`SetupDecoder`].
/// Respond to requests with the control transfer and data transfer methods.
pub struct Controller<R, I, D> {
    regs: R,
    irq: I,
    decoder: D,
    caches: Mutex<RefCell<Caches>>,
    initialized: AtomicBool,
}

impl<R, I, D> Controller<R, I, D> {
    /// Create a controller
    ///
    /// Creation doesn't touch the hardware.
    pub const fn new(regs: R, irq: I, decoder: D) -> Self {
        Controller {
            regs,
            irq,
            decoder,
            caches: Mutex::new(RefCell::new(Caches::new())),
            initialized: AtomicBool::new(false),
        }
    }

    /// Indicates if [`configure()`](Controller::configure) completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

impl<R, I, D> Controller<R, I, D>
where
    R: Registers,
    I: InterruptControl,
    D: SetupDecoder,
{
    /// Bring up the USB controller and attach to the bus
    ///
    /// `handler` is registered for both USB interrupt lines. It should call
    /// [`on_interrupt()`](Controller::on_interrupt).
    ///
    /// Only the first successful call has an effect. If the PLL doesn't lock
    /// within `config.pll_lock`, this returns [`Error::Timeout`] and leaves
    /// the controller disabled; you may call `configure()` again.
    pub fn configure(&self, config: &Config, handler: fn()) -> Result<(), Error> {
        if self.is_initialized() {
            return Ok(());
        }

        interrupt::free(&self.irq, |_| {
            self.regs.clear_bits(Reg::USBCON, Usbcon::USBE.bits());
            self.regs.set_bits(Reg::UHWCON, Uhwcon::UVREGE.bits());

            // The lock wait used to be unbounded. It's now bounded by
            // the configuration, unless you ask for Timeout::unbounded().
            pll::initialize(&self.regs, config.cpu_frequency, config.pll_lock)?;

            self.regs
                .set_bits(Reg::USBCON, (Usbcon::USBE | Usbcon::OTGPADE).bits());
            self.regs.clear_bits(Reg::USBCON, Usbcon::FRZCLK.bits());
            // Full speed
            self.regs.clear_bits(Reg::UDCON, Udcon::LSM.bits());
            self.regs.clear_bits(Reg::UDCON, Udcon::DETACH.bits());

            self.regs.set_bits(
                Reg::UDIEN,
                (DeviceInterrupt::EORST | DeviceInterrupt::SOF).bits(),
            );

            self.irq.register(Irq::General, handler);
            self.irq.register(Irq::Endpoint, handler);

            self.initialized.store(true, Ordering::Release);
            debug!("CONFIGURED");
            Ok(())
        })
    }

    /// Service the USB interrupt
    ///
    /// Call this from the handler registered by [`configure()`](Controller::configure).
    /// The endpoint selection is the same on return as it was on entry.
    pub fn on_interrupt(&self) {
        let selected = self.regs.read(Reg::UENUM);

        let flags = DeviceInterrupt::from_bits_retain(self.regs.read(Reg::UDINT));
        self.regs.write(Reg::UDINT, 0);

        let status = Endpoint::select(&self.regs, 0).status();
        let actions = dispatch::plan(flags, status);
        trace!("ISR {=u8:X} {=u8:X}", flags.bits(), status.bits());

        if actions.contains(Actions::RESET) {
            if self.init_endpoint(0, EndpointConfig::Control).is_err() {
                warn!("EP0 CONFIGURATION REJECTED");
            }
            Endpoint::select(&self.regs, 0).enable_setup_interrupt();
            debug!("RESET");
        }

        if actions.contains(Actions::FRAME) {
            Endpoint::select(&self.regs, 0).frame_housekeeping();
        }

        if actions.contains(Actions::SETUP) {
            let packet = Endpoint::select(&self.regs, 0).read_setup();
            debug!("EP0 SETUP");
            self.decoder.decode(&packet);
        }

        self.regs.write(Reg::UENUM, selected);
    }

    /// Configure endpoint `index`
    ///
    /// An `index` beyond the last endpoint is ignored, as is a
    /// [`Disabled`](EndpointConfig::Disabled) configuration.
    /// Bulk and interrupt endpoints return [`Error::Unsupported`] without
    /// touching the hardware.
    pub fn init_endpoint(&self, index: usize, config: EndpointConfig) -> Result<(), Error> {
        if index >= ENDPOINT_COUNT {
            return Ok(());
        }

        match config {
            EndpointConfig::Disabled => Ok(()),
            EndpointConfig::Bulk(_) | EndpointConfig::Interrupt(_) => Err(Error::Unsupported),
            EndpointConfig::Control => interrupt::free(&self.irq, |_| {
                let ep = Endpoint::select(&self.regs, index);
                ep.enable();
                ep.configure_control()
            }),
        }
    }

    /// Latch the device address assigned by SET_ADDRESS
    ///
    /// Call this after acknowledging the request, once the status stage is
    /// queued. Waits for the EP0 transmitter to drain within `timeout`, then
    /// writes the address before enabling it. On timeout, the address
    /// register is untouched.
    pub fn set_address(&self, address: u8, timeout: Timeout) -> Result<(), Error> {
        let ep0 = Endpoint::select(&self.regs, 0);
        if let Err(err) = timeout.wait(|| ep0.is_tx_ready()) {
            warn!("ADDRESS {} TIMEOUT", address);
            return Err(err);
        }

        self.regs.write(Reg::UDADDR, address & Udaddr::UADD.bits());
        self.regs.set_bits(Reg::UDADDR, Udaddr::ADDEN.bits());
        debug!("ADDRESS {}", address);
        Ok(())
    }

    /// Send a zero length packet on EP0
    pub fn send_zlp(&self) -> Result<usize, Error> {
        self.send_packet(0, &[], 0)
    }

    /// Send `data` from an IN endpoint
    ///
    /// Returns the number of bytes sent. See [`send_packet()`](Controller::send_packet)
    /// for the details.
    pub fn send_in_packet(&self, endpoint: usize, data: &[u8]) -> Result<usize, Error> {
        self.send_packet(endpoint, data, 0)
    }

    /// Send at most `max_len` bytes of `data` from an IN endpoint
    ///
    /// A `max_len` of zero means "no limit." The packet is staged in the
    /// endpoint's cache buffer, so it's also limited by the buffer size.
    ///
    /// A non-control endpoint that can't accept the packet returns
    /// [`Error::WouldBlock`]. Control endpoints are always written. Retry
    /// is up to you.
    pub fn send_packet(
        &self,
        endpoint: usize,
        data: &[u8],
        max_len: usize,
    ) -> Result<usize, Error> {
        let mut count = data.len();
        if 0 < max_len && max_len < count {
            count = max_len;
        }

        let count = interrupt::free(&self.irq, |cs| {
            let mut caches = self.caches.borrow(cs).borrow_mut();
            caches.for_in(endpoint).map(|cache| cache.fill(&data[..count]))
        })
        .ok_or(Error::InvalidEndpoint)?;

        self.send_via_endpoint_in(endpoint, count)
    }

    /// Write `count` bytes from the endpoint's cache into its FIFO, and
    /// release the FIFO to the hardware
    fn send_via_endpoint_in(&self, endpoint: usize, count: usize) -> Result<usize, Error> {
        let ep = Endpoint::select(&self.regs, endpoint);

        // Control endpoints skip the readiness check, and are always written.
        if !ep.is_control() && !ep.is_write_allowed() {
            trace!("EP{} NOT READY", endpoint);
            return Err(Error::WouldBlock);
        }

        interrupt::free(&self.irq, |cs| {
            let mut caches = self.caches.borrow(cs).borrow_mut();
            let cache = caches.for_in(endpoint).ok_or(Error::InvalidEndpoint)?;
            let data = cache.as_slice();
            let data = &data[..count.min(data.len())];

            ep.write(data);
            ep.release_in();
            trace!("EP{} In {}", endpoint, data.len());
            Ok(data.len())
        })
    }

    /// Receive a control OUT data packet on EP0
    ///
    /// Waits within `timeout` for the OUT bank. The bank is drained into the
    /// EP0 OUT cache and released. A packet that isn't exactly
    /// [`CONTROL_PACKET_LEN`] bytes is an [`Error::ReadSize`].
    pub fn receive_control_packet(
        &self,
        timeout: Timeout,
    ) -> Result<[u8; CONTROL_PACKET_LEN], Error> {
        let ep0 = Endpoint::select(&self.regs, 0);

        // RXOUTI signals a complete OUT bank, so there's only one
        // condition to wait on.
        if let Err(err) = timeout.wait(|| ep0.has_out()) {
            warn!("EP0 Out TIMEOUT");
            return Err(err);
        }

        let received = ep0.byte_count();
        interrupt::free(&self.irq, |cs| {
            let mut caches = self.caches.borrow(cs).borrow_mut();
            let out = &mut caches.control_out;
            out.fill_with(received, || ep0.read_byte());
            ep0.release_out();
            debug!("EP0 Out {}", received);

            if received != CONTROL_PACKET_LEN {
                return Err(Error::ReadSize {
                    expected: CONTROL_PACKET_LEN,
                    received,
                });
            }

            let mut packet = [0; CONTROL_PACKET_LEN];
            packet.copy_from_slice(&out.as_slice()[..CONTROL_PACKET_LEN]);
            Ok(packet)
        })
    }

    /// Stall (`true`) or unstall (`false`) an endpoint
    ///
    /// An `index` beyond the last endpoint is ignored.
    pub fn set_stalled(&self, index: usize, stall: bool) {
        if index >= ENDPOINT_COUNT {
            return;
        }
        interrupt::free(&self.irq, |_| {
            Endpoint::select(&self.regs, index).set_stalled(stall);
        });
    }

    /// Indicates if an endpoint has a stall request pending
    pub fn is_stalled(&self, index: usize) -> bool {
        index < ENDPOINT_COUNT
            && interrupt::free(&self.irq, |_| Endpoint::select(&self.regs, index).is_stalled())
    }

    /// Detach the device from the bus
    pub fn detach(&self) {
        self.regs.set_bits(Reg::UDCON, Udcon::DETACH.bits());
        debug!("DETACH");
    }

    /// Reset into the bootloader
    ///
    /// Reserved. This does nothing.
    pub fn enter_bootloader(&self) {
        // TODO write the bootloader key, and let the watchdog reset the MCU.
        debug!("BOOTLOADER");
    }
}
