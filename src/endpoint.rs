use crate::{
    ral::{Reg, Registers, Uecfg0x, Uecfg1x, Ueconx, Ueienx, Ueintx, Uesta0x},
    Error, SETUP_PACKET_LEN,
};
use usb_device::{endpoint::EndpointType, UsbDirection};

/// How to configure an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum EndpointConfig {
    /// Leave the endpoint alone
    Disabled,
    /// A bidirectional control endpoint, with a single 64 byte bank
    Control,
    /// A bulk endpoint
    ///
    /// Not yet supported; configuration returns [`Error::Unsupported`].
    Bulk(UsbDirection),
    /// An interrupt endpoint
    ///
    /// Not yet supported; configuration returns [`Error::Unsupported`].
    Interrupt(UsbDirection),
}

impl EndpointConfig {
    /// Describe an endpoint using the `usb-device` vocabulary
    ///
    /// Isochronous endpoints are not recognized, and map to `Disabled`.
    pub fn new(kind: EndpointType, direction: UsbDirection) -> Self {
        match kind {
            EndpointType::Control => EndpointConfig::Control,
            EndpointType::Bulk => EndpointConfig::Bulk(direction),
            EndpointType::Interrupt => EndpointConfig::Interrupt(direction),
            EndpointType::Isochronous { .. } => EndpointConfig::Disabled,
        }
    }
}

/// Written to EP0's `UEINTX` on start of frame when its FIFO holds data
const FRAME_HOUSEKEEPING: Ueintx = Ueintx::RWAL
    .union(Ueintx::NAKOUTI)
    .union(Ueintx::RXSTPI)
    .union(Ueintx::STALLEDI);

/// The currently-selected USB endpoint
///
/// Endpoint registers are banked by `UENUM`. An `Endpoint` is only
/// meaningful while no one else changes the selection.
pub struct Endpoint<'a, R> {
    regs: &'a R,
}

impl<'a, R: Registers> Endpoint<'a, R> {
    /// Select endpoint `index`
    pub fn select(regs: &'a R, index: usize) -> Self {
        regs.write(Reg::UENUM, index as u8);
        Endpoint { regs }
    }

    /// Enable the endpoint
    pub fn enable(&self) {
        self.regs.set_bits(Reg::UECONX, Ueconx::EPEN.bits());
    }

    /// Configure a control endpoint with a single 64 byte bank
    ///
    /// Returns [`Error::ConfigurationRejected`] if the hardware didn't accept
    /// the configuration.
    pub fn configure_control(&self) -> Result<(), Error> {
        self.regs.write(Reg::UECFG0X, 0);
        self.regs.set_bits(
            Reg::UECFG1X,
            (Uecfg1x::EPSIZE1 | Uecfg1x::EPSIZE0 | Uecfg1x::ALLOC).bits(),
        );
        self.regs.write(Reg::UEINTX, 0);

        if self.regs.has_bits(Reg::UESTA0X, Uesta0x::CFGOK.bits()) {
            Ok(())
        } else {
            Err(Error::ConfigurationRejected)
        }
    }

    /// Indicates if this is a control endpoint
    pub fn is_control(&self) -> bool {
        self.regs.read(Reg::UECFG0X) & Uecfg0x::EPTYPE.bits() == 0
    }

    /// Returns the endpoint interrupt flags
    pub fn status(&self) -> Ueintx {
        Ueintx::from_bits_retain(self.regs.read(Reg::UEINTX))
    }

    /// Indicates if the FIFO accepts a write
    pub fn is_write_allowed(&self) -> bool {
        self.regs.has_bits(Reg::UEINTX, Ueintx::RWAL.bits())
    }

    /// Indicates if the transmitter is ready for the next IN packet
    pub fn is_tx_ready(&self) -> bool {
        self.regs.has_bits(Reg::UEINTX, Ueintx::TXINI.bits())
    }

    /// Indicates if an OUT bank has been received
    pub fn has_out(&self) -> bool {
        self.regs.has_bits(Reg::UEINTX, Ueintx::RXOUTI.bits())
    }

    /// Returns the number of bytes in the FIFO
    pub fn byte_count(&self) -> usize {
        self.regs.read(Reg::UEBCLX) as usize
    }

    /// Acknowledge the SETUP packet, and read it out of the FIFO
    ///
    /// This is only meaningful for a control endpoint.
    pub fn read_setup(&self) -> [u8; SETUP_PACKET_LEN] {
        self.regs.clear_bits(
            Reg::UEINTX,
            (Ueintx::RXSTPI | Ueintx::RXOUTI | Ueintx::TXINI).bits(),
        );
        let mut packet = [0; SETUP_PACKET_LEN];
        packet.iter_mut().for_each(|b| *b = self.read_byte());
        packet
    }

    /// Read one byte from the FIFO
    pub fn read_byte(&self) -> u8 {
        self.regs.read(Reg::UEDATX)
    }

    /// Write `data` into the FIFO
    pub fn write(&self, data: &[u8]) {
        for b in data {
            self.regs.write(Reg::UEDATX, *b);
        }
    }

    /// Hand the FIFO contents to the hardware for transmission
    pub fn release_in(&self) {
        self.regs.clear_bits(
            Reg::UEINTX,
            (Ueintx::FIFOCON | Ueintx::NAKINI | Ueintx::RXOUTI | Ueintx::TXINI).bits(),
        );
    }

    /// Free the received OUT bank
    pub fn release_out(&self) {
        self.regs.clear_bits(Reg::UEINTX, Ueintx::RXOUTI.bits());
    }

    /// Enable the SETUP received interrupt
    pub fn enable_setup_interrupt(&self) {
        self.regs.set_bits(Reg::UEIENX, Ueienx::RXSTPE.bits());
    }

    /// Start-of-frame status maintenance
    ///
    /// Does nothing if the FIFO is empty.
    pub fn frame_housekeeping(&self) {
        if self.byte_count() > 0 {
            self.regs.write(Reg::UEINTX, FRAME_HOUSEKEEPING.bits());
        }
    }

    /// Stall or unstall the endpoint
    pub fn set_stalled(&self, stall: bool) {
        if stall {
            self.regs.set_bits(Reg::UECONX, Ueconx::STALLRQ.bits());
        } else {
            self.regs.set_bits(Reg::UECONX, Ueconx::STALLRQC.bits());
        }
    }

    /// Indicates if a stall is requested
    pub fn is_stalled(&self) -> bool {
        self.regs.has_bits(Reg::UECONX, Ueconx::STALLRQ.bits())
    }
}
