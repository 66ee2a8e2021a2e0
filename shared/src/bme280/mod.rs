//! BME280 register protocol adapter
//!
//! Sequences chip identification, soft reset, calibration load and settings
//! on [`Bme280::initialize`], then forced one-shot measurements on
//! [`Bme280::measure`]. Waiting is delegated to an `embedded_hal` delay so the
//! platform decides how to block.

pub mod calibration;
pub mod registers;

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::bus::{BusConfig, BusEngine, BusError, TwoWire};
use crate::log::{log_debug, log_error, log_info};

pub use calibration::{Calibration, Compensated, RawData};
pub use registers::{Filter, Oversampling, Settings};

/// One measurement cycle's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    /// 0.01 °C
    pub temperature: i16,
    /// 0.01 %RH
    pub humidity: u16,
    /// 0.1 hPa
    pub pressure: u16,
}

impl SensorReading {
    pub fn from_compensated(values: &Compensated) -> Self {
        Self {
            // compensation clamps to -4000..=8500
            temperature: values.temperature as i16,
            humidity: humidity_centi_percent(values.humidity),
            pressure: pressure_deci_hpa(values.pressure),
        }
    }
}

/// Q22.10 %RH to 0.01 %RH: divide by 10.24, round half away from zero.
pub const fn humidity_centi_percent(native: u32) -> u16 {
    ((native * 100 + 512) / 1024) as u16
}

/// Pa to 0.1 hPa, truncating.
pub const fn pressure_deci_hpa(pascal: u32) -> u16 {
    (pascal / 10) as u16
}

/// Where in the sensor protocol a bus failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorStep {
    BusSetup,
    ChipId,
    Reset,
    Calibration,
    Configure,
    Trigger,
    Fetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The bus failed during `step`
    BusFailure { step: SensorStep, error: BusError },
    /// Chip id register did not read 0x60
    UnexpectedDeviceId { found: u8 },
    /// `measure` called before a successful `initialize`
    NotInitialized,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::BusFailure { step, error } => {
                write!(f, "bus failure during {:?}: {}", step, error)
            }
            SensorError::UnexpectedDeviceId { found } => {
                write!(f, "unexpected chip id {:#x}", found)
            }
            SensorError::NotInitialized => write!(f, "sensor not initialized"),
        }
    }
}

trait AtStep<T> {
    fn at(self, step: SensorStep) -> Result<T, SensorError>;
}

impl<T> AtStep<T> for Result<T, BusError> {
    fn at(self, step: SensorStep) -> Result<T, SensorError> {
        self.map_err(|error| SensorError::BusFailure { step, error })
    }
}

/// BME280 on a two-wire bus. Owns the bus engine.
pub struct Bme280<B> {
    bus: BusEngine<B>,
    address: u8,
    settings: Settings,
    conversion_delay: Duration,
    calibration: Option<Calibration>,
}

impl<B: TwoWire> Bme280<B> {
    pub fn new(bus: B, address: u8, settings: Settings, conversion_delay: Duration) -> Self {
        Self {
            bus: BusEngine::new(bus),
            address,
            settings,
            conversion_delay,
            calibration: None,
        }
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Bring up the bus, check the chip, load calibration and push settings.
    pub fn initialize<D: DelayNs>(
        &mut self,
        bus_config: &BusConfig,
        delay: &mut D,
    ) -> Result<(), SensorError> {
        self.bus.configure(bus_config).at(SensorStep::BusSetup)?;

        let mut id = [0u8; 1];
        self.bus
            .read_register(self.address, registers::CHIP_ID, &mut id)
            .at(SensorStep::ChipId)?;
        if id[0] != registers::CHIP_ID_BME280 {
            log_error!("unexpected chip id {:#x}", id[0]);
            return Err(SensorError::UnexpectedDeviceId { found: id[0] });
        }

        self.bus
            .write_register(self.address, registers::RESET, &[registers::RESET_COMMAND])
            .at(SensorStep::Reset)?;
        delay.delay_ms(registers::RESET_DELAY_MS);

        let mut block0 = [0u8; registers::CALIB_00_LEN];
        let mut block1 = [0u8; registers::CALIB_26_LEN];
        self.bus
            .read_register(self.address, registers::CALIB_00, &mut block0)
            .at(SensorStep::Calibration)?;
        self.bus
            .read_register(self.address, registers::CALIB_26, &mut block1)
            .at(SensorStep::Calibration)?;
        let calibration = Calibration::parse(&block0, &block1);
        log_debug!("calibration loaded");

        // ctrl_hum only takes effect after the following ctrl_meas write
        self.bus
            .write_register(self.address, registers::CTRL_HUM, &[self.settings.ctrl_hum()])
            .at(SensorStep::Configure)?;
        self.bus
            .write_register(
                self.address,
                registers::CTRL_MEAS,
                &[self.settings.ctrl_meas(registers::MODE_SLEEP)],
            )
            .at(SensorStep::Configure)?;
        self.bus
            .write_register(self.address, registers::CONFIG, &[self.settings.config()])
            .at(SensorStep::Configure)?;

        self.calibration = Some(calibration);
        log_info!("BME280 ready at {:#x}", self.address);
        Ok(())
    }

    /// Trigger one forced conversion, wait it out, then read and compensate.
    ///
    /// The wait is not cancellable; reading earlier would return the
    /// previous or a half-updated conversion.
    pub fn measure<D: DelayNs>(&mut self, delay: &mut D) -> Result<SensorReading, SensorError> {
        let calibration = self.calibration.ok_or(SensorError::NotInitialized)?;

        log_debug!("triggering forced measurement");
        self.bus
            .write_register(
                self.address,
                registers::CTRL_MEAS,
                &[self.settings.ctrl_meas(registers::MODE_FORCED)],
            )
            .at(SensorStep::Trigger)?;

        delay.delay_us(self.conversion_delay.as_micros() as u32);

        let mut data = [0u8; registers::DATA_LEN];
        self.bus
            .read_register(self.address, registers::DATA, &mut data)
            .at(SensorStep::Fetch)?;

        let values = calibration.compensate(&RawData::parse(&data));
        let reading = SensorReading::from_compensated(&values);
        log_debug!(
            "t={} h={} p={}",
            reading.temperature,
            reading.humidity,
            reading.pressure
        );
        Ok(reading)
    }

    pub fn release(self) -> B {
        self.bus.release()
    }
}
