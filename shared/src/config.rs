//! Per-deployment node configuration

use core::fmt;
use core::time::Duration;

use crate::advertisement::MAX_NAME_LEN;
use crate::bme280::registers::{self, Settings};
use crate::bus::BusConfig;
use crate::radio::AdvertisingParams;

/// Everything a wake cycle needs, fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub bus: BusConfig,
    /// 7-bit sensor address
    pub sensor_address: u8,
    pub settings: Settings,
    /// Wake-to-wake period
    pub period: Duration,
    /// How long the advertisement stays on air each cycle
    pub advertise_window: Duration,
    /// Blocking wait between the forced-mode trigger and the data read
    pub conversion_delay: Duration,
    pub advertising: AdvertisingParams,
    /// Complete local name in the advertisement
    pub device_name: &'static str,
}

impl NodeConfig {
    pub const fn new(bus: BusConfig) -> Self {
        Self {
            bus,
            sensor_address: registers::ADDRESS_PRIMARY,
            settings: Settings::new(),
            period: Duration::from_secs(60),
            advertise_window: Duration::from_secs(5),
            conversion_delay: Duration::from_millis(10),
            advertising: AdvertisingParams::broadcast(Duration::from_millis(500)),
            device_name: "NN Sensor",
        }
    }

    /// Time spent in deep sleep: the nominal remainder of the period,
    /// independent of how long the cycle actually took.
    pub fn sleep_duration(&self) -> Duration {
        self.period.saturating_sub(self.advertise_window)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.advertise_window >= self.period {
            return Err(ConfigError::WindowExceedsPeriod);
        }
        if self.bus.frequency_hz == 0 {
            return Err(ConfigError::ZeroBusFrequency);
        }
        if self.bus.timeout.is_zero() {
            return Err(ConfigError::ZeroBusTimeout);
        }
        if self.conversion_delay < self.settings.max_measurement_time() {
            return Err(ConfigError::ConversionDelayTooShort);
        }
        if self.device_name.len() > MAX_NAME_LEN {
            return Err(ConfigError::DeviceNameTooLong);
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Advertise window must be shorter than the period
    WindowExceedsPeriod,
    ZeroBusFrequency,
    ZeroBusTimeout,
    /// Conversion delay below the worst case for the configured oversampling
    ConversionDelayTooShort,
    /// Name does not fit next to the frame in 31 bytes
    DeviceNameTooLong,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WindowExceedsPeriod => write!(f, "advertise window not shorter than period"),
            ConfigError::ZeroBusFrequency => write!(f, "bus frequency is zero"),
            ConfigError::ZeroBusTimeout => write!(f, "bus timeout is zero"),
            ConfigError::ConversionDelayTooShort => write!(f, "conversion delay too short"),
            ConfigError::DeviceNameTooLong => write!(f, "device name too long"),
        }
    }
}
