//! Factory trimming and integer compensation
//!
//! Compensation follows the Bosch reference integer formulas. Intermediates
//! are carried in `i64` so out-of-range raw values cannot overflow; for
//! in-range inputs the results match the 32-bit reference bit for bit.

use super::registers::{CALIB_00_LEN, CALIB_26_LEN};

/// Trimming coefficients from the sensor's NVM. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

/// Uncompensated ADC values from one data burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawData {
    pub pressure: u32,
    pub temperature: u32,
    pub humidity: u32,
}

impl RawData {
    pub fn parse(data: &[u8; 8]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };
        Self {
            pressure: adc20(data[0], data[1], data[2]),
            temperature: adc20(data[3], data[4], data[5]),
            humidity: (u32::from(data[6]) << 8) | u32::from(data[7]),
        }
    }
}

/// Results in the sensor's native units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Compensated {
    /// 0.01 °C
    pub temperature: i32,
    /// Pa
    pub pressure: u32,
    /// Q22.10 %RH (value / 1024 = %RH)
    pub humidity: u32,
}

const TEMPERATURE_MIN: i64 = -4_000;
const TEMPERATURE_MAX: i64 = 8_500;
const PRESSURE_MIN: u32 = 30_000;
const PRESSURE_MAX: u32 = 110_000;
const HUMIDITY_MAX: i64 = 102_400;

impl Calibration {
    pub fn parse(block0: &[u8; CALIB_00_LEN], block1: &[u8; CALIB_26_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([block0[i], block0[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([block0[i], block0[i + 1]]);

        // dig_H4 and dig_H5 share the nibbles of 0xE5
        let h4 = (i16::from(block1[3] as i8) << 4) | i16::from(block1[4] & 0x0F);
        let h5 = (i16::from(block1[5] as i8) << 4) | i16::from(block1[4] >> 4);

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            h1: block0[25],
            h2: i16::from_le_bytes([block1[0], block1[1]]),
            h3: block1[2],
            h4,
            h5,
            h6: block1[6] as i8,
        }
    }

    pub fn compensate(&self, raw: &RawData) -> Compensated {
        let (t_fine, temperature) = self.temperature(raw.temperature);
        Compensated {
            temperature,
            pressure: self.pressure(raw.pressure, t_fine),
            humidity: self.humidity(raw.humidity, t_fine),
        }
    }

    /// Returns (t_fine, 0.01 °C).
    fn temperature(&self, adc: u32) -> (i64, i32) {
        let adc = i64::from(adc);
        let t1 = i64::from(self.t1);

        let var1 = (((adc / 8) - t1 * 2) * i64::from(self.t2)) / 2048;
        let var2 = (adc / 16) - t1;
        let var2 = (((var2 * var2) / 4096) * i64::from(self.t3)) / 16384;
        let t_fine = var1 + var2;

        let temperature = ((t_fine * 5 + 128) / 256).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
        (t_fine, temperature as i32)
    }

    fn pressure(&self, adc: u32, t_fine: i64) -> u32 {
        let var1 = (t_fine / 2) - 64_000;
        let quarter_sq = (var1 / 4) * (var1 / 4);

        let var2 = (quarter_sq / 2048) * i64::from(self.p6);
        let var2 = var2 + var1 * i64::from(self.p5) * 2;
        let var2 = (var2 / 4) + i64::from(self.p4) * 65_536;
        let var3 = (i64::from(self.p3) * (quarter_sq / 8192)) / 8;
        let var4 = (i64::from(self.p2) * var1) / 2;
        let var1 = (var3 + var4) / 262_144;
        let var1 = ((32_768 + var1) * i64::from(self.p1)) / 32_768;

        if var1 == 0 {
            return PRESSURE_MIN;
        }

        let var5 = 1_048_576u32.wrapping_sub(adc);
        let mut pressure = var5.wrapping_sub((var2 / 4096) as u32).wrapping_mul(3125);
        let divisor = var1 as u32;
        pressure = if pressure < 0x8000_0000 {
            (pressure << 1) / divisor
        } else {
            (pressure / divisor) * 2
        };

        let eighth = i64::from(pressure / 8);
        let var1 = (i64::from(self.p9) * ((eighth * eighth) / 8192)) / 4096;
        let var2 = (i64::from(pressure / 4) * i64::from(self.p8)) / 8192;
        let pressure = i64::from(pressure) + (var1 + var2 + i64::from(self.p7)) / 16;

        pressure.clamp(i64::from(PRESSURE_MIN), i64::from(PRESSURE_MAX)) as u32
    }

    fn humidity(&self, adc: u32, t_fine: i64) -> u32 {
        let var1 = t_fine - 76_800;
        let var2 = i64::from(adc) * 16_384;
        let var3 = i64::from(self.h4) * 1_048_576;
        let var4 = i64::from(self.h5) * var1;
        let var5 = (((var2 - var3) - var4) + 16_384) / 32_768;
        let var2 = (var1 * i64::from(self.h6)) / 1024;
        let var3 = (var1 * i64::from(self.h3)) / 2048;
        let var4 = ((var2 * (var3 + 32_768)) / 1024) + 2_097_152;
        let var2 = ((var4 * i64::from(self.h2)) + 8192) / 16_384;
        let var3 = var5 * var2;
        let var4 = ((var3 / 32_768) * (var3 / 32_768)) / 128;
        let var5 = (var3 - ((var4 * i64::from(self.h1)) / 16)).clamp(0, 419_430_400);

        (var5 / 4096).min(HUMIDITY_MAX) as u32
    }
}
