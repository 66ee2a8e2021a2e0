//! Duty-cycle scheduler
//!
//! One wake cycle walks
//!
//! ```text
//! Idle -> RadioInit -> SensorInit -> Measuring -> Advertising -> Sleeping
//!            \             \             \
//!             +-------------+-------------+--> Failed -> Sleeping
//! ```
//!
//! and then suspends the whole system. Errors are never retried: the next
//! wake is the retry. Sleep is always `period - advertise_window`, no matter
//! how long the cycle took or where it failed.

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::advertisement::{self, Frame};
use crate::bme280::{Bme280, SensorError, SensorReading};
use crate::bus::TwoWire;
use crate::config::{ConfigError, NodeConfig};
use crate::log::{log_error, log_info, log_warn};
use crate::radio::{Radio, RadioError};

/// Most transitions a single cycle can make (`Idle` included).
pub const MAX_TRANSITIONS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleState {
    Idle,
    RadioInit,
    SensorInit,
    Measuring,
    Advertising,
    Failed,
    Sleeping,
}

/// What ended a cycle early, or spoiled its broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleFailure {
    Radio(RadioError),
    Sensor(SensorError),
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleFailure::Radio(e) => write!(f, "radio: {}", e),
            CycleFailure::Sensor(e) => write!(f, "sensor: {}", e),
        }
    }
}

impl From<RadioError> for CycleFailure {
    fn from(error: RadioError) -> Self {
        CycleFailure::Radio(error)
    }
}

impl From<SensorError> for CycleFailure {
    fn from(error: SensorError) -> Self {
        CycleFailure::Sensor(error)
    }
}

/// Result of [`DutyCycle::run_cycle`], observed just before the system sleeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Every state entered, in order, ending in `Sleeping`
    pub states: Vec<CycleState, MAX_TRANSITIONS>,
    pub reading: Option<SensorReading>,
    pub failure: Option<CycleFailure>,
    pub sleep_for: Duration,
}

impl CycleOutcome {
    pub fn advertised(&self) -> bool {
        self.states.contains(&CycleState::Advertising) && self.failure.is_none()
    }
}

/// Full-system suspension. Nothing runs until the next wake, which starts
/// over at `Idle`.
pub trait Sleeper {
    fn deep_sleep(&mut self, duration: Duration) -> !;
}

/// Owns every resource a cycle touches; there is no other state.
pub struct DutyCycle<B, R, D> {
    config: NodeConfig,
    sensor: Bme280<B>,
    radio: R,
    delay: D,
}

impl<B, R, D> DutyCycle<B, R, D>
where
    B: TwoWire,
    R: Radio,
    D: DelayNs,
{
    pub fn new(config: NodeConfig, bus: B, radio: R, delay: D) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            sensor: Bme280::new(
                bus,
                config.sensor_address,
                config.settings,
                config.conversion_delay,
            ),
            config,
            radio,
            delay,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run one cycle, then suspend for the rest of the period.
    pub fn run<S: Sleeper>(mut self, sleeper: &mut S) -> ! {
        let outcome = self.run_cycle();
        sleeper.deep_sleep(outcome.sleep_for)
    }

    /// Run one cycle up to the point of sleeping. Meant to be called once per
    /// wake; use [`DutyCycle::run`] on hardware.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let mut cycle = Cycle::new();
        let mut radio_started = false;

        let result = self.acquire(&mut cycle, &mut radio_started);
        let (reading, failure) = match result {
            Ok(reading) => {
                cycle.enter(CycleState::Advertising);
                let failure = self.advertise(&reading).err().map(CycleFailure::from);
                (Some(reading), failure)
            }
            Err(failure) => {
                log_error!("cycle failed: {:?}", failure);
                cycle.enter(CycleState::Failed);
                (None, Some(failure))
            }
        };

        if radio_started {
            if let Err(e) = self.radio.stop() {
                log_warn!("radio stop failed: {:?}", e);
            }
        }

        cycle.enter(CycleState::Sleeping);
        let sleep_for = self.config.sleep_duration();
        log_info!("sleeping for {} ms", sleep_for.as_millis() as u64);

        CycleOutcome {
            states: cycle.states,
            reading,
            failure,
            sleep_for,
        }
    }

    fn acquire(
        &mut self,
        cycle: &mut Cycle,
        radio_started: &mut bool,
    ) -> Result<SensorReading, CycleFailure> {
        cycle.enter(CycleState::RadioInit);
        self.radio.start()?;
        *radio_started = true;

        cycle.enter(CycleState::SensorInit);
        self.sensor.initialize(&self.config.bus, &mut self.delay)?;

        cycle.enter(CycleState::Measuring);
        Ok(self.sensor.measure(&mut self.delay)?)
    }

    /// Broadcast `reading` and hold the window open. On a radio error the
    /// hold is skipped.
    fn advertise(&mut self, reading: &SensorReading) -> Result<(), RadioError> {
        let frame = Frame::from_reading(reading).encode();
        let payload = advertisement::payload(self.config.device_name, &frame)
            .map_err(|_| RadioError::AdvertisingData)?;

        self.radio.set_advertisement_data(&payload).map_err(|e| {
            log_error!("advertising data: {:?}", e);
            e
        })?;
        self.radio
            .start_advertising(&self.config.advertising)
            .map_err(|e| {
                log_error!("start advertising: {:?}", e);
                e
            })?;

        log_info!(
            "advertising t={} h={} for {} ms",
            reading.temperature,
            reading.humidity,
            self.config.advertise_window.as_millis() as u64
        );
        self.delay
            .delay_ms(self.config.advertise_window.as_millis() as u32);
        Ok(())
    }
}

struct Cycle {
    states: Vec<CycleState, MAX_TRANSITIONS>,
}

impl Cycle {
    fn new() -> Self {
        let mut cycle = Self { states: Vec::new() };
        cycle.enter(CycleState::Idle);
        cycle
    }

    fn enter(&mut self, state: CycleState) {
        log_info!("-> {:?}", state);
        // a cycle never revisits a state, so the trail cannot overflow
        let _ = self.states.push(state);
    }
}
