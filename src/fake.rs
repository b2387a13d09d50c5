//! Software stand-ins for the hardware, used by the unit tests

use crate::{
    interrupt::{InterruptControl, Irq},
    ral::{Pllcsr, Reg, Registers, Uecfg1x, Ueconx, Uesta0x},
    SetupDecoder, SETUP_PACKET_LEN,
};
use core::cell::{Cell, RefCell};
use std::{collections::VecDeque, rc::Rc, vec::Vec};

const ENDPOINTS: usize = 7;
const EP_REGS: usize = 8;

/// A register write, as observed by the fake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Write {
    pub reg: Reg,
    pub value: u8,
    /// The selected endpoint, for endpoint registers
    pub endpoint: Option<usize>,
    /// Interrupts were disabled during the write
    pub masked: bool,
}

/// A register file that behaves enough like the USB controller
///
/// - endpoint registers are banked by `UENUM`
/// - `UEDATX` reads pop from a per-endpoint receive queue, and writes
///   append to a per-endpoint transmit log
/// - `UEBCLX` reads the receive queue length
/// - allocating a bank sets `CFGOK`, unless configuration is rejected
/// - writing `STALLRQC` clears `STALLRQ`
/// - `PLOCK` reads as set once the PLL is locked
pub struct FakeRegisters {
    device: RefCell<Vec<(Reg, u8)>>,
    endpoints: [[Cell<u8>; EP_REGS]; ENDPOINTS],
    rx: RefCell<[VecDeque<u8>; ENDPOINTS]>,
    tx: RefCell<[Vec<u8>; ENDPOINTS]>,
    writes: RefCell<Vec<Write>>,
    pll_locked: Cell<bool>,
    reject_configuration: Cell<bool>,
    interrupts_disabled: Rc<Cell<bool>>,
    written: Rc<Cell<usize>>,
}

fn endpoint_slot(reg: Reg) -> usize {
    match reg {
        Reg::UEINTX => 0,
        Reg::UECONX => 1,
        Reg::UECFG0X => 2,
        Reg::UECFG1X => 3,
        Reg::UESTA0X => 4,
        Reg::UEIENX => 5,
        Reg::UEDATX => 6,
        Reg::UEBCLX => 7,
        _ => unreachable!("{:?} is not an endpoint register", reg),
    }
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self::watching(Rc::new(Cell::new(false)), Rc::new(Cell::new(0)))
    }

    /// Record whether interrupts were disabled with each write, and count
    /// writes into `written`
    fn watching(interrupts_disabled: Rc<Cell<bool>>, written: Rc<Cell<usize>>) -> Self {
        FakeRegisters {
            device: RefCell::new(Vec::new()),
            endpoints: Default::default(),
            rx: RefCell::new(Default::default()),
            tx: RefCell::new(Default::default()),
            writes: RefCell::new(Vec::new()),
            pll_locked: Cell::new(false),
            reject_configuration: Cell::new(false),
            interrupts_disabled,
            written,
        }
    }

    fn selected(&self) -> usize {
        self.get(Reg::UENUM) as usize
    }

    /// Read a device register without side effects
    pub fn get(&self, reg: Reg) -> u8 {
        if reg.is_endpoint_register() {
            return self.endpoint(self.selected(), reg);
        }
        self.device
            .borrow()
            .iter()
            .rev()
            .find(|(r, _)| *r == reg)
            .map(|(_, value)| *value)
            .unwrap_or(0)
    }

    /// Set a device register without logging a write
    pub fn set(&self, reg: Reg, value: u8) {
        assert!(!reg.is_endpoint_register());
        self.device.borrow_mut().push((reg, value));
    }

    /// Read an endpoint register without side effects
    pub fn endpoint(&self, endpoint: usize, reg: Reg) -> u8 {
        match reg {
            Reg::UEBCLX => self.rx.borrow()[endpoint].len() as u8,
            _ => self.endpoints[endpoint][endpoint_slot(reg)].get(),
        }
    }

    /// Set an endpoint register without logging a write
    pub fn set_endpoint(&self, endpoint: usize, reg: Reg, value: u8) {
        self.endpoints[endpoint][endpoint_slot(reg)].set(value);
    }

    /// Queue bytes received from the host
    pub fn push_rx(&self, endpoint: usize, data: &[u8]) {
        self.rx.borrow_mut()[endpoint].extend(data.iter().copied());
    }

    /// Returns the bytes written into an endpoint FIFO
    pub fn tx(&self, endpoint: usize) -> Vec<u8> {
        self.tx.borrow()[endpoint].clone()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.borrow().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }

    /// Returns the writes to `reg`, in order
    pub fn writes_to(&self, reg: Reg) -> Vec<Write> {
        self.writes
            .borrow()
            .iter()
            .filter(|w| w.reg == reg)
            .copied()
            .collect()
    }

    pub fn lock_pll(&self) {
        self.pll_locked.set(true);
    }

    pub fn reject_configuration(&self) {
        self.reject_configuration.set(true);
    }
}

impl Registers for FakeRegisters {
    fn read(&self, reg: Reg) -> u8 {
        match reg {
            Reg::UEDATX => {
                let endpoint = self.selected();
                self.rx.borrow_mut()[endpoint].pop_front().unwrap_or(0)
            }
            Reg::PLLCSR if self.pll_locked.get() => self.get(reg) | Pllcsr::PLOCK.bits(),
            _ => self.get(reg),
        }
    }

    fn write(&self, reg: Reg, value: u8) {
        let endpoint = reg.is_endpoint_register().then(|| self.selected());
        self.writes.borrow_mut().push(Write {
            reg,
            value,
            endpoint,
            masked: self.interrupts_disabled.get(),
        });
        self.written.set(self.written.get() + 1);

        let Some(endpoint) = endpoint else {
            self.device.borrow_mut().push((reg, value));
            return;
        };

        match reg {
            Reg::UEDATX => self.tx.borrow_mut()[endpoint].push(value),
            Reg::UECONX if value & Ueconx::STALLRQC.bits() != 0 => {
                let value = value & !(Ueconx::STALLRQ | Ueconx::STALLRQC).bits();
                self.set_endpoint(endpoint, reg, value);
            }
            Reg::UECFG1X => {
                self.set_endpoint(endpoint, reg, value);
                if value & Uecfg1x::ALLOC.bits() != 0 && !self.reject_configuration.get() {
                    let status = self.endpoint(endpoint, Reg::UESTA0X);
                    self.set_endpoint(endpoint, Reg::UESTA0X, status | Uesta0x::CFGOK.bits());
                }
            }
            _ => self.set_endpoint(endpoint, reg, value),
        }
    }
}

/// Interrupt control that tracks masking, and records registrations
pub struct FakeInterrupts {
    disabled: Rc<Cell<bool>>,
    disables: Cell<usize>,
    restores: Cell<usize>,
    registered: RefCell<Vec<(Irq, fn())>>,
    written: Rc<Cell<usize>>,
    registered_after: RefCell<Vec<usize>>,
}

impl FakeInterrupts {
    pub fn new() -> Self {
        FakeInterrupts {
            disabled: Rc::new(Cell::new(false)),
            disables: Cell::new(0),
            restores: Cell::new(0),
            registered: RefCell::new(Vec::new()),
            written: Rc::new(Cell::new(0)),
            registered_after: RefCell::new(Vec::new()),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.get()
    }

    pub fn disable_count(&self) -> usize {
        self.disables.get()
    }

    pub fn restore_count(&self) -> usize {
        self.restores.get()
    }

    pub fn registered(&self) -> Vec<(Irq, fn())> {
        self.registered.borrow().clone()
    }

    /// For each registration, the number of register writes that preceded
    /// it
    ///
    /// Only meaningful for interrupts from [`bench()`].
    pub fn registered_after(&self) -> Vec<usize> {
        self.registered_after.borrow().clone()
    }
}

unsafe impl InterruptControl for FakeInterrupts {
    type State = bool;

    fn disable(&self) -> bool {
        self.disables.set(self.disables.get() + 1);
        self.disabled.replace(true)
    }

    fn restore(&self, was_disabled: bool) {
        self.restores.set(self.restores.get() + 1);
        self.disabled.set(was_disabled);
    }

    fn register(&self, irq: Irq, handler: fn()) {
        self.registered.borrow_mut().push((irq, handler));
        self.registered_after.borrow_mut().push(self.written.get());
    }
}

/// Registers and interrupt control that observe each other
pub fn bench() -> (FakeRegisters, FakeInterrupts) {
    let irq = FakeInterrupts::new();
    let regs = FakeRegisters::watching(Rc::clone(&irq.disabled), Rc::clone(&irq.written));
    (regs, irq)
}

/// Remembers every SETUP packet it's given
#[derive(Default)]
pub struct RecordingDecoder {
    packets: RefCell<Vec<[u8; SETUP_PACKET_LEN]>>,
}

impl RecordingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> Vec<[u8; SETUP_PACKET_LEN]> {
        self.packets.borrow().clone()
    }
}

impl SetupDecoder for RecordingDecoder {
    fn decode(&self, packet: &[u8; SETUP_PACKET_LEN]) {
        self.packets.borrow_mut().push(*packet);
    }
}
