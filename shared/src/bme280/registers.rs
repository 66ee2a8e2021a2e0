//! BME280 register map and measurement settings (Bosch datasheet rev. 1.6)

use core::time::Duration;

/// SDO tied to GND
pub const ADDRESS_PRIMARY: u8 = 0x76;
/// SDO tied to VDDIO
pub const ADDRESS_SECONDARY: u8 = 0x77;

pub const CHIP_ID: u8 = 0xD0;
pub const CHIP_ID_BME280: u8 = 0x60;

pub const RESET: u8 = 0xE0;
pub const RESET_COMMAND: u8 = 0xB6;
/// Start-up time after a soft reset
pub const RESET_DELAY_MS: u32 = 2;

/// 0x88..=0xA1: T1..T3, P1..P9, one unused byte, H1
pub const CALIB_00: u8 = 0x88;
pub const CALIB_00_LEN: usize = 26;
/// 0xE1..=0xE7: H2..H6
pub const CALIB_26: u8 = 0xE1;
pub const CALIB_26_LEN: usize = 7;

pub const CTRL_HUM: u8 = 0xF2;
pub const STATUS: u8 = 0xF3;
pub const CTRL_MEAS: u8 = 0xF4;
pub const CONFIG: u8 = 0xF5;

/// press_msb..hum_lsb
pub const DATA: u8 = 0xF7;
pub const DATA_LEN: usize = 8;

pub const MODE_SLEEP: u8 = 0b00;
pub const MODE_FORCED: u8 = 0b01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    Skipped = 0b000,
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
}

impl Oversampling {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Samples averaged per reading.
    pub const fn samples(self) -> u32 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// IIR filter coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Filter {
    Off = 0b000,
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
}

/// Oversampling per channel plus the filter coefficient.
///
/// Written once during initialization; the device keeps the authoritative copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub temperature: Oversampling,
    pub pressure: Oversampling,
    pub humidity: Oversampling,
    pub filter: Filter,
}

impl Settings {
    /// 1x on every channel, filter off: one forced measurement fits in 10 ms.
    pub const fn new() -> Self {
        Self {
            temperature: Oversampling::X1,
            pressure: Oversampling::X1,
            humidity: Oversampling::X1,
            filter: Filter::Off,
        }
    }

    pub const fn ctrl_hum(&self) -> u8 {
        self.humidity.bits()
    }

    pub const fn ctrl_meas(&self, mode: u8) -> u8 {
        (self.temperature.bits() << 5) | (self.pressure.bits() << 2) | (mode & 0b11)
    }

    pub const fn config(&self) -> u8 {
        (self.filter as u8) << 2
    }

    /// Worst-case forced conversion time (datasheet appendix B):
    /// 1.25 ms + 2.3 ms * T + (2.3 ms * P + 0.575 ms) + (2.3 ms * H + 0.575 ms)
    pub const fn max_measurement_time(&self) -> Duration {
        let mut us = 1_250 + 2_300 * self.temperature.samples();
        if self.pressure.samples() > 0 {
            us += 2_300 * self.pressure.samples() + 575;
        }
        if self.humidity.samples() > 0 {
            us += 2_300 * self.humidity.samples() + 575;
        }
        Duration::from_micros(us as u64)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
