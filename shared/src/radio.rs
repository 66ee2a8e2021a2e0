//! Broadcast-only radio seam
//!
//! The node never connects or scans: it brings the controller up, hands over
//! one advertising payload, advertises for the hold window and shuts down.

use core::fmt;
use core::time::Duration;

/// Advertising interval unit, 0.625 ms
const INTERVAL_UNIT_US: u64 = 625;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingKind {
    /// ADV_IND
    ConnectableUndirected,
    /// ADV_SCAN_IND
    ScannableUndirected,
    /// ADV_NONCONN_IND
    NonConnectable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OwnAddress {
    Public,
    Random,
}

/// Primary advertising channels 37, 38 and 39 as a bitmap.
pub const CHANNELS_ALL: u8 = 0b111;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParams {
    /// In 0.625 ms units
    pub interval_min: u16,
    /// In 0.625 ms units
    pub interval_max: u16,
    pub kind: AdvertisingKind,
    pub own_address: OwnAddress,
    pub channel_map: u8,
}

impl AdvertisingParams {
    /// Non-connectable, public address, all channels, fixed interval.
    pub const fn broadcast(interval: Duration) -> Self {
        let units = interval_units(interval);
        Self {
            interval_min: units,
            interval_max: units,
            kind: AdvertisingKind::NonConnectable,
            own_address: OwnAddress::Public,
            channel_map: CHANNELS_ALL,
        }
    }
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self::broadcast(Duration::from_millis(500))
    }
}

/// Duration to 0.625 ms units, clamped to the HCI range 0x0020..=0x4000.
pub const fn interval_units(interval: Duration) -> u16 {
    let units = interval.as_micros() as u64 / INTERVAL_UNIT_US;
    if units < 0x0020 {
        0x0020
    } else if units > 0x4000 {
        0x4000
    } else {
        units as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Controller or host stack could not be brought up
    ControllerInit,
    /// Advertising payload rejected
    AdvertisingData,
    /// Advertising parameters rejected
    AdvertisingParameters,
    /// Enabling advertising failed
    StartAdvertising,
    /// Stopping advertising or releasing the controller failed
    Shutdown,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::ControllerInit => write!(f, "radio controller init failed"),
            RadioError::AdvertisingData => write!(f, "advertising data rejected"),
            RadioError::AdvertisingParameters => write!(f, "advertising parameters rejected"),
            RadioError::StartAdvertising => write!(f, "failed to start advertising"),
            RadioError::Shutdown => write!(f, "radio shutdown failed"),
        }
    }
}

/// Radio subsystem as seen by the scheduler.
pub trait Radio {
    /// Power up the controller and host stack.
    fn start(&mut self) -> Result<(), RadioError>;

    /// Replace the advertising payload (at most 31 bytes).
    fn set_advertisement_data(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Apply `params` and begin advertising. Returns once advertising runs.
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), RadioError>;

    /// Stop advertising and release the controller before sleep.
    fn stop(&mut self) -> Result<(), RadioError>;
}
