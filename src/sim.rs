//! Simulated ADS129x on the far side of an SPI bus, for host tests.
//!
//! The simulation decodes the opcode stream byte by byte (RREG/WREG with
//! their count and value phases, single-byte commands, zero bytes clocked
//! while reading data), so tests exercise the real [`SpiTransport`] framing.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};

use crate::bus::SpiTransport;
use crate::driver::{Clock, Driver, Platform};
use crate::handoff::Handoff;

pub const ADS1294_ID: u8 = 0x90;
pub const ADS1296_ID: u8 = 0x91;
pub const ADS1298_ID: u8 = 0x92;
pub const ADS1299_4_ID: u8 = 0x3C;
pub const ADS1299_6_ID: u8 = 0x3D;
pub const ADS1299_ID: u8 = 0x3E;

const REGISTER_COUNT: usize = 0x20;

#[derive(Clone, Copy)]
enum Phase {
    Opcode,
    Count { reg: u8, write: bool },
    Value { reg: u8, write: bool },
}

struct State {
    id: u8,
    registers: [u8; REGISTER_COUNT],
    selected: bool,
    selections: usize,
    phase: Phase,
    wire: Vec<u8>,
    commands: Vec<u8>,
    stray: usize,
    frame: Vec<u8>,
    cursor: usize,
}

fn channels_for(id: u8) -> usize {
    match id & 0x1F {
        0x10 | 0x1C => 4,
        0x11 | 0x1D => 6,
        _ => 8,
    }
}

fn power_on_registers(id: u8) -> [u8; REGISTER_COUNT] {
    let mut regs = [0u8; REGISTER_COUNT];
    regs[0x00] = id;
    regs[0x01] = 0x96;
    regs[0x02] = 0xC0;
    regs[0x03] = 0x60;
    for reg in regs.iter_mut().skip(0x05).take(8) {
        *reg = 0x61;
    }
    regs[0x14] = 0x0F;
    regs
}

impl State {
    fn new(id: u8) -> Self {
        let len = 3 * (channels_for(id) + 1);
        let mut frame: Vec<u8> = (0..len).map(|i| i as u8).collect();
        frame[..3].copy_from_slice(&[0xC0, 0x00, 0x00]);
        Self {
            id,
            registers: power_on_registers(id),
            selected: false,
            selections: 0,
            phase: Phase::Opcode,
            wire: Vec::new(),
            commands: Vec::new(),
            stray: 0,
            frame,
            cursor: 0,
        }
    }

    fn exchange(&mut self, tx: u8) -> u8 {
        if !self.selected {
            self.stray += 1;
            return 0xFF;
        }
        self.wire.push(tx);
        match self.phase {
            Phase::Opcode => match tx {
                0x20..=0x3F => {
                    self.phase = Phase::Count { reg: tx & 0x1F, write: false };
                    0
                }
                0x40..=0x5F => {
                    self.phase = Phase::Count { reg: tx & 0x1F, write: true };
                    0
                }
                0x00 => {
                    let byte = self.frame[self.cursor % self.frame.len()];
                    self.cursor += 1;
                    byte
                }
                cmd => {
                    self.commands.push(cmd);
                    if cmd == 0x06 {
                        self.registers = power_on_registers(self.id);
                    }
                    0
                }
            },
            Phase::Count { reg, write } => {
                self.phase = Phase::Value { reg, write };
                0
            }
            Phase::Value { reg, write } => {
                self.phase = Phase::Opcode;
                let reg = reg as usize;
                if write {
                    if reg != 0 {
                        self.registers[reg] = tx;
                    }
                    0
                } else {
                    self.registers[reg]
                }
            }
        }
    }
}

/// SPI side of the simulation.
pub struct SimSpi(Rc<RefCell<State>>);

/// Chip-select side of the simulation.
pub struct SimCs(Rc<RefCell<State>>);

pub struct NoDelay;

/// Inspection handle kept by the test.
#[derive(Clone)]
pub struct Sim(Rc<RefCell<State>>);

impl SpiErrorType for SimSpi {
    type Error = Infallible;
}

impl SpiBus for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for w in words {
            *w = state.exchange(0);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for w in words {
            state.exchange(*w);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for i in 0..read.len().max(write.len()) {
            let rx = state.exchange(write.get(i).copied().unwrap_or(0));
            if let Some(r) = read.get_mut(i) {
                *r = rx;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for w in words {
            *w = state.exchange(*w);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl PinErrorType for SimCs {
    type Error = Infallible;
}

impl OutputPin for SimCs {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        state.selected = true;
        state.selections += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        state.selected = false;
        state.phase = Phase::Opcode;
        state.cursor = 0;
        Ok(())
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

impl Sim {
    pub fn register(&self, reg: u8) -> u8 {
        self.0.borrow().registers[reg as usize]
    }

    pub fn set_register(&self, reg: u8, value: u8) {
        self.0.borrow_mut().registers[reg as usize] = value;
    }

    /// Bytes clocked out while selected, in order.
    pub fn wire(&self) -> Vec<u8> {
        self.0.borrow().wire.clone()
    }

    /// Single-byte commands decoded so far.
    pub fn commands(&self) -> Vec<u8> {
        self.0.borrow().commands.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.0.borrow_mut();
        state.wire.clear();
        state.commands.clear();
    }

    pub fn selections(&self) -> usize {
        self.0.borrow().selections
    }

    pub fn selected(&self) -> bool {
        self.0.borrow().selected
    }

    /// Bytes clocked while chip-select was released.
    pub fn stray_bytes(&self) -> usize {
        self.0.borrow().stray
    }

    /// The conversion result returned by every data read.
    pub fn frame(&self) -> Vec<u8> {
        self.0.borrow().frame.clone()
    }
}

pub type SimTransport = SpiTransport<SimSpi, SimCs, NoDelay>;

/// A transport wired to a fresh simulated device with the given ID register.
pub fn transport(id: u8) -> (SimTransport, Sim) {
    let state = Rc::new(RefCell::new(State::new(id)));
    let transport = SpiTransport::new(
        SimSpi(state.clone()),
        SimCs(state.clone()),
        NoDelay,
    );
    // construction raises select once; start tests from a clean count
    state.borrow_mut().selections = 0;
    (transport, Sim(state))
}

/// Host output port capturing everything written to it.
#[derive(Clone, Default)]
pub struct Sink(Rc<RefCell<Vec<u8>>>);

impl Sink {
    pub fn take(&self) -> Vec<u8> {
        core::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn take_string(&self) -> String {
        String::from_utf8(self.take()).unwrap()
    }
}

impl embedded_io::ErrorType for Sink {
    type Error = Infallible;
}

impl embedded_io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct Led(Rc<Cell<bool>>);

impl Led {
    pub fn is_on(&self) -> bool {
        self.0.get()
    }
}

impl PinErrorType for Led {
    type Error = Infallible;
}

impl OutputPin for Led {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn set(&self, micros: u64) {
        self.0.set(micros);
    }
}

impl Clock for SimClock {
    fn micros(&self) -> u64 {
        self.0.get()
    }
}

pub struct SimPlatform;

impl Platform for SimPlatform {
    type Transport = SimTransport;
    type Output = Sink;
    type Led = Led;
    type Clock = SimClock;
}

/// Everything a driver test needs to poke at.
pub struct Bench {
    pub sim: Sim,
    pub out: Sink,
    pub led: Led,
    pub clock: SimClock,
}

/// A driver already set up against a simulated device.
pub fn driver(id: u8, handoff: &Handoff) -> (Driver<'_, SimPlatform>, Bench) {
    let (transport, sim) = transport(id);
    let out = Sink::default();
    let led = Led::default();
    let clock = SimClock::default();
    let mut driver = Driver::new(
        transport,
        out.clone(),
        led.clone(),
        clock.clone(),
        handoff,
        crate::config::Config::DEFAULT,
    );
    driver.setup().unwrap();
    sim.clear_log();
    out.take();
    (driver, Bench { sim, out, led, clock })
}
