//! Two-wire bus transaction engine
//!
//! Register access on top of a raw [`TwoWire`] driver. A register read is a
//! single transaction with a repeated start between the register pointer write
//! and the data read:
//!
//! ```text
//! START - ADDR(W) - REG - REPEATED_START - ADDR(R) - DATA.. (last NACK) - STOP
//! ```
//!
//! A register write is one phase:
//!
//! ```text
//! START - ADDR(W) - REG - DATA.. - STOP
//! ```
//!
//! No retries happen here; every failure is handed to the caller unchanged.

use core::fmt;
use core::time::Duration;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation};

use crate::log::log_trace;

/// Highest valid 7-bit device address.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Bus wiring and timing, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Data line GPIO number
    pub sda_pin: u8,
    /// Clock line GPIO number
    pub scl_pin: u8,
    /// Clock frequency in Hz
    pub frequency_hz: u32,
    /// Upper bound for a single transaction
    pub timeout: Duration,
}

impl BusConfig {
    pub const fn new(sda_pin: u8, scl_pin: u8) -> Self {
        Self {
            sda_pin,
            scl_pin,
            frequency_hz: 100_000,
            timeout: Duration::from_secs(1),
        }
    }

    pub const fn with_frequency(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(22, 23)
    }
}

/// Bus-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Driver could not be installed, or was already installed
    DriverInstall,
    /// Transaction attempted before `configure`
    NotConfigured,
    /// Address does not fit in 7 bits
    InvalidAddress(u8),
    /// Transaction did not finish within the configured timeout
    Timeout,
    /// Device did not acknowledge its address or a data byte
    Nack,
    /// Another master took the bus
    ArbitrationLost,
    /// Any other bus fault reported by the driver
    Bus,
}

impl BusError {
    /// Classify a generic `embedded-hal` error.
    ///
    /// `embedded-hal` has no timeout kind, drivers that can time out should
    /// report [`BusError::Timeout`] themselves before falling back to this.
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoAcknowledge(_) => BusError::Nack,
            ErrorKind::ArbitrationLoss => BusError::ArbitrationLost,
            _ => BusError::Bus,
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::DriverInstall => write!(f, "bus driver install failed"),
            BusError::NotConfigured => write!(f, "bus not configured"),
            BusError::InvalidAddress(addr) => write!(f, "invalid 7-bit address {:#x}", addr),
            BusError::Timeout => write!(f, "bus transaction timed out"),
            BusError::Nack => write!(f, "device did not acknowledge"),
            BusError::ArbitrationLost => write!(f, "bus arbitration lost"),
            BusError::Bus => write!(f, "bus error"),
        }
    }
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            BusError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            BusError::Bus => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

/// Raw bus driver
///
/// # Invariants
///
/// - `install` is called at most once per power-on
/// - `transaction` runs all operations between one START and one STOP,
///   with a repeated START only where the direction changes, and NACKs the
///   last byte of the final read
/// - a transaction that exceeds the installed timeout fails with
///   [`BusError::Timeout`] after the full timeout has elapsed
pub trait TwoWire {
    /// Apply pins, clock and timeout and bring up the peripheral.
    fn install(&mut self, config: &BusConfig) -> Result<(), BusError>;

    /// Run one bus transaction against `address` (7-bit).
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError>;
}

/// Register-level access to devices on one bus.
pub struct BusEngine<B> {
    bus: B,
    config: Option<BusConfig>,
}

impl<B: TwoWire> BusEngine<B> {
    pub fn new(bus: B) -> Self {
        Self { bus, config: None }
    }

    /// Install the driver. Only the first call per power-on succeeds.
    pub fn configure(&mut self, config: &BusConfig) -> Result<(), BusError> {
        if self.config.is_some() {
            return Err(BusError::DriverInstall);
        }
        self.bus.install(config)?;
        log_trace!(
            "bus up: sda={} scl={} {}Hz",
            config.sda_pin,
            config.scl_pin,
            config.frequency_hz
        );
        self.config = Some(*config);
        Ok(())
    }

    pub fn config(&self) -> Option<&BusConfig> {
        self.config.as_ref()
    }

    /// Fill `buffer` with consecutive registers starting at `register`.
    pub fn read_register(&mut self, device: u8, register: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        self.check(device)?;
        log_trace!("read {:#x}[{:#x}] len={}", device, register, buffer.len());
        self.bus.transaction(
            device,
            &mut [Operation::Write(&[register]), Operation::Read(buffer)],
        )
    }

    /// Write `data` to consecutive registers starting at `register`.
    pub fn write_register(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
        self.check(device)?;
        log_trace!("write {:#x}[{:#x}] len={}", device, register, data.len());
        self.bus.transaction(
            device,
            &mut [Operation::Write(&[register]), Operation::Write(data)],
        )
    }

    pub fn release(self) -> B {
        self.bus
    }

    fn check(&self, device: u8) -> Result<(), BusError> {
        if self.config.is_none() {
            return Err(BusError::NotConfigured);
        }
        if device > MAX_ADDRESS {
            return Err(BusError::InvalidAddress(device));
        }
        Ok(())
    }
}
