use climate_shared::{BusConfig, BusError, TwoWire};
use embedded_hal::i2c::{I2c as _, Operation};
use esp_hal::{
    gpio::{AnyPin, Pin},
    i2c::master::{BusTimeout, Config, Error, I2c},
    peripherals::I2C0,
    prelude::*,
    Blocking,
};

/// I2C0 with its two pins, turned into a driver on `install`.
pub struct EspBus {
    parts: Option<(I2C0, AnyPin, AnyPin)>,
    driver: Option<I2c<'static, Blocking>>,
}

impl EspBus {
    pub fn new(i2c: I2C0, sda: impl Pin, scl: impl Pin) -> Self {
        Self {
            parts: Some((i2c, sda.degrade(), scl.degrade())),
            driver: None,
        }
    }
}

impl TwoWire for EspBus {
    fn install(&mut self, config: &BusConfig) -> Result<(), BusError> {
        let (i2c, sda, scl) = self.parts.take().ok_or(BusError::DriverInstall)?;
        if sda.number() != config.sda_pin || scl.number() != config.scl_pin {
            defmt::error!(
                "bus wired to sda={} scl={}, config wants sda={} scl={}",
                sda.number(),
                scl.number(),
                config.sda_pin,
                config.scl_pin
            );
            return Err(BusError::DriverInstall);
        }

        // the peripheral counts its timeout in bus clock cycles
        let cycles = config.timeout.as_micros() as u64 * config.frequency_hz as u64 / 1_000_000;
        let hal_config = Config::default()
            .with_frequency(config.frequency_hz.Hz())
            .with_timeout(BusTimeout::BusCycles(cycles as u32));

        let driver = I2c::new(i2c, hal_config)
            .map_err(|_| BusError::DriverInstall)?
            .with_sda(sda)
            .with_scl(scl);
        self.driver = Some(driver);
        Ok(())
    }

    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let driver = self.driver.as_mut().ok_or(BusError::NotConfigured)?;
        driver.transaction(address, operations).map_err(map_error)
    }
}

fn map_error(error: Error) -> BusError {
    match error {
        Error::Timeout => BusError::Timeout,
        Error::ArbitrationLost => BusError::ArbitrationLost,
        Error::AcknowledgeCheckFailed(_) => BusError::Nack,
        other => BusError::from_kind(embedded_hal::i2c::Error::kind(&other)),
    }
}
