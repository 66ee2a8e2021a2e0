//! Hand-written fakes for host tests
//!
//! Every fake is a cheap handle around shared state, so a test can keep a
//! clone for inspection after moving the other one into the code under test.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::Operation;

use crate::bme280::registers;
use crate::bus::{BusConfig, BusError, TwoWire};
use crate::radio::{AdvertisingParams, Radio, RadioError};
use crate::scheduler::Sleeper;

/// One phase on the wire; adjacent writes are merged as the bus does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusPhase {
    Write(Vec<u8>),
    Read(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTransaction {
    pub address: u8,
    pub phases: Vec<BusPhase>,
}

/// Register file of a BME280 sitting on the mock bus.
#[derive(Debug, Clone)]
pub struct Bme280Sim {
    pub address: u8,
    pub registers: [u8; 256],
    pointer: u8,
}

/// Factory trimming used throughout the tests (datasheet-style coefficients).
pub const CALIB_00: [u8; 26] = [
    0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C,
    0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17, 0x00, 0x4B,
];
pub const CALIB_26: [u8; 7] = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];

/// adc_P=415148, adc_T=519888, adc_H=30000 -> 25.08 °C, 100654 Pa, 55.00 %RH
pub const RAW_DATASHEET: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];
/// adc_P=415148, adc_T=446880, adc_H=21045 -> 2.15 °C, 97149 Pa, 6.50 %RH
pub const RAW_COLD_DRY: [u8; 8] = [0x65, 0x5A, 0xC0, 0x6D, 0x1A, 0x00, 0x52, 0x35];

impl Bme280Sim {
    pub fn new(raw: [u8; 8]) -> Self {
        let mut registers = [0u8; 256];
        registers[registers::CHIP_ID as usize] = registers::CHIP_ID_BME280;
        registers[0x88..0x88 + CALIB_00.len()].copy_from_slice(&CALIB_00);
        registers[0xE1..0xE1 + CALIB_26.len()].copy_from_slice(&CALIB_26);
        registers[0xF7..0xF7 + raw.len()].copy_from_slice(&raw);
        Self {
            address: registers::ADDRESS_PRIMARY,
            registers,
            pointer: 0,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some((&register, data)) = bytes.split_first() {
            self.pointer = register;
            for &byte in data {
                self.registers[self.pointer as usize] = byte;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    installs: usize,
    install_fails: bool,
    transactions: Vec<BusTransaction>,
    failures: Vec<(usize, BusError)>,
    read_queue: VecDeque<u8>,
    device: Option<Bme280Sim>,
}

/// Recording bus; answers from a [`Bme280Sim`] when one is attached,
/// otherwise from a queue of canned bytes.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Rc<RefCell<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: Bme280Sim) -> Self {
        let bus = Self::new();
        bus.state.borrow_mut().device = Some(device);
        bus
    }

    pub fn queue_read(&mut self, bytes: &[u8]) {
        self.state.borrow_mut().read_queue.extend(bytes.iter().copied());
    }

    pub fn fail_install(&mut self) {
        self.state.borrow_mut().install_fails = true;
    }

    /// Make the `index`-th transaction (0-based) fail with `error`.
    pub fn fail_transaction(&mut self, index: usize, error: BusError) {
        self.state.borrow_mut().failures.push((index, error));
    }

    pub fn transactions(&self) -> Vec<BusTransaction> {
        self.state.borrow().transactions.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.borrow().transactions.len()
    }

    pub fn installs(&self) -> usize {
        self.state.borrow().installs
    }

    pub fn register(&self, register: u8) -> u8 {
        self.state
            .borrow()
            .device
            .as_ref()
            .map(|device| device.registers[register as usize])
            .unwrap_or(0)
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        if let Some(device) = self.state.borrow_mut().device.as_mut() {
            device.registers[register as usize] = value;
        }
    }
}

impl TwoWire for MockBus {
    fn install(&mut self, _config: &BusConfig) -> Result<(), BusError> {
        let mut state = self.state.borrow_mut();
        if state.install_fails {
            return Err(BusError::DriverInstall);
        }
        state.installs += 1;
        Ok(())
    }

    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let mut state = self.state.borrow_mut();

        let mut phases: Vec<BusPhase> = Vec::new();
        for operation in operations.iter() {
            match (operation, phases.last_mut()) {
                (Operation::Write(bytes), Some(BusPhase::Write(previous))) => {
                    previous.extend_from_slice(bytes)
                }
                (Operation::Write(bytes), _) => phases.push(BusPhase::Write(bytes.to_vec())),
                (Operation::Read(buffer), _) => phases.push(BusPhase::Read(buffer.len())),
            }
        }

        let index = state.transactions.len();
        state.transactions.push(BusTransaction {
            address,
            phases: phases.clone(),
        });

        if let Some(&(_, error)) = state.failures.iter().find(|(i, _)| *i == index) {
            return Err(error);
        }

        let BusState {
            device, read_queue, ..
        } = &mut *state;
        match device {
            Some(device) if device.address == address => {
                // writes precede the read in every transaction the engine issues
                for phase in &phases {
                    if let BusPhase::Write(bytes) = phase {
                        device.write(bytes);
                    }
                }
                for operation in operations.iter_mut() {
                    if let Operation::Read(buffer) = operation {
                        device.read(buffer);
                    }
                }
                Ok(())
            }
            Some(_) => Err(BusError::Nack),
            None => {
                for operation in operations.iter_mut() {
                    if let Operation::Read(buffer) = operation {
                        for byte in buffer.iter_mut() {
                            *byte = read_queue.pop_front().unwrap_or(0);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Start,
    SetAdvertisementData(Vec<u8>),
    StartAdvertising(AdvertisingParams),
    Stop,
}

#[derive(Debug, Default)]
struct RadioState {
    calls: Vec<RadioCall>,
    fail_start: Option<RadioError>,
    fail_data: Option<RadioError>,
    fail_advertising: Option<RadioError>,
}

#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    state: Rc<RefCell<RadioState>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_start(&mut self, error: RadioError) {
        self.state.borrow_mut().fail_start = Some(error);
    }

    pub fn fail_advertisement_data(&mut self, error: RadioError) {
        self.state.borrow_mut().fail_data = Some(error);
    }

    pub fn fail_start_advertising(&mut self, error: RadioError) {
        self.state.borrow_mut().fail_advertising = Some(error);
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.state.borrow().calls.clone()
    }

    pub fn advertisement_data(&self) -> Option<Vec<u8>> {
        self.calls().into_iter().find_map(|call| match call {
            RadioCall::SetAdvertisementData(data) => Some(data),
            _ => None,
        })
    }
}

impl Radio for MockRadio {
    fn start(&mut self) -> Result<(), RadioError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(RadioCall::Start);
        state.fail_start.map_or(Ok(()), Err)
    }

    fn set_advertisement_data(&mut self, data: &[u8]) -> Result<(), RadioError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(RadioCall::SetAdvertisementData(data.to_vec()));
        state.fail_data.map_or(Ok(()), Err)
    }

    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), RadioError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(RadioCall::StartAdvertising(*params));
        state.fail_advertising.map_or(Ok(()), Err)
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        self.state.borrow_mut().calls.push(RadioCall::Stop);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DelayState {
    elapsed_ns: u64,
    /// (wait, transactions seen on the bus when the wait started)
    waits: Vec<(Duration, usize)>,
    bus: Option<MockBus>,
}

/// Simulated clock: waits return immediately and advance `elapsed`.
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    state: Rc<RefCell<DelayState>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp each wait with the bus transaction count, to check ordering.
    pub fn watching(bus: &MockBus) -> Self {
        let delay = Self::new();
        delay.state.borrow_mut().bus = Some(bus.clone());
        delay
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.state.borrow().elapsed_ns)
    }

    pub fn waits(&self) -> Vec<(Duration, usize)> {
        self.state.borrow().waits.clone()
    }

    fn record(&mut self, ns: u64) {
        let mut state = self.state.borrow_mut();
        let seen = state.bus.as_ref().map_or(0, MockBus::transaction_count);
        state.elapsed_ns += ns;
        state.waits.push((Duration::from_nanos(ns), seen));
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(u64::from(ms) * 1_000_000);
    }
}

/// Carried by the unwind that replaces deep sleep in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest(pub Duration);

/// Deep sleep never returns; in tests it unwinds with a [`SleepRequest`].
pub struct UnwindSleeper;

impl Sleeper for UnwindSleeper {
    fn deep_sleep(&mut self, duration: Duration) -> ! {
        std::panic::panic_any(SleepRequest(duration))
    }
}
