//! Core of the battery climate node: bus transactions, the BME280 register
//! protocol, the advertisement frame and the wake/measure/broadcast/sleep cycle.
//!
//! Nothing in here touches a concrete chip. The firmware crate plugs its HAL
//! into [`bus::TwoWire`], [`radio::Radio`], [`scheduler::Sleeper`] and
//! `embedded_hal::delay::DelayNs`.

#![cfg_attr(not(test), no_std)]

mod log;

pub mod advertisement;
pub mod bme280;
pub mod bus;
pub mod config;
pub mod radio;
pub mod scheduler;

#[cfg(test)]
mod mock;

pub use advertisement::{encode, Frame, FRAME_LEN};
pub use bme280::{Bme280, SensorError, SensorReading};
pub use bus::{BusConfig, BusEngine, BusError, TwoWire};
pub use config::{ConfigError, NodeConfig};
pub use radio::{AdvertisingParams, Radio, RadioError};
pub use scheduler::{CycleFailure, CycleOutcome, CycleState, DutyCycle, Sleeper};
