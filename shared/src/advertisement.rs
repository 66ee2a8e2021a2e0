//! Manufacturer-specific advertisement frame
//!
//! | Offset | Size | Field         | Encoding                          |
//! |--------|------|---------------|-----------------------------------|
//! | 0      | 2    | Company ID    | little-endian, 0xFFFF placeholder |
//! | 2      | 1    | Content flags | bit0 temperature, bit1 humidity   |
//! | 3      | 2    | Temperature   | little-endian i16, 0.01 °C        |
//! | 5      | 2    | Humidity      | little-endian u16, 0.01 %RH       |
//!
//! The frame rides in the manufacturer data AD structure of a legacy
//! advertisement, next to the flags and the device name.

use core::fmt;

use heapless::Vec;

use crate::bme280::SensorReading;

pub const FRAME_LEN: usize = 7;

/// Reserved "no company" identifier, used until one is assigned.
pub const COMPANY_ID: u16 = 0xFFFF;

pub const FLAG_TEMPERATURE: u8 = 0x01;
pub const FLAG_HUMIDITY: u8 = 0x02;

/// Legacy advertising data limit
pub const MAX_PAYLOAD_LEN: usize = 31;

pub const AD_FLAGS: u8 = 0x01;
pub const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_MANUFACTURER_DATA: u8 = 0xFF;

/// LE General Discoverable | BR/EDR Not Supported
pub const ADVERTISING_FLAGS: u8 = 0x06;

/// Longest name that still fits next to the flags and the frame.
pub const MAX_NAME_LEN: usize = MAX_PAYLOAD_LEN - 3 - (2 + FRAME_LEN) - 2;

pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// Encode both fields; flags are always 0x03.
pub fn encode(temperature: i16, humidity: u16) -> [u8; FRAME_LEN] {
    Frame {
        temperature: Some(temperature),
        humidity: Some(humidity),
    }
    .encode()
}

/// Frame contents; a `None` field is sent as zero with its flag cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub temperature: Option<i16>,
    pub humidity: Option<u16>,
}

impl Frame {
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            temperature: Some(reading.temperature),
            humidity: Some(reading.humidity),
        }
    }

    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.temperature.is_some() {
            flags |= FLAG_TEMPERATURE;
        }
        if self.humidity.is_some() {
            flags |= FLAG_HUMIDITY;
        }
        flags
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0..2].copy_from_slice(&COMPANY_ID.to_le_bytes());
        frame[2] = self.flags();
        frame[3..5].copy_from_slice(&self.temperature.unwrap_or(0).to_le_bytes());
        frame[5..7].copy_from_slice(&self.humidity.unwrap_or(0).to_le_bytes());
        frame
    }

    /// Decode manufacturer data as a receiver would. Unknown flag bits are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() != FRAME_LEN {
            return Err(DecodeError::Length(data.len()));
        }
        let company = u16::from_le_bytes([data[0], data[1]]);
        if company != COMPANY_ID {
            return Err(DecodeError::UnknownCompany(company));
        }
        let flags = data[2];
        let temperature = i16::from_le_bytes([data[3], data[4]]);
        let humidity = u16::from_le_bytes([data[5], data[6]]);
        Ok(Self {
            temperature: (flags & FLAG_TEMPERATURE != 0).then_some(temperature),
            humidity: (flags & FLAG_HUMIDITY != 0).then_some(humidity),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Manufacturer data is not exactly one frame long
    Length(usize),
    /// Frame from another vendor
    UnknownCompany(u16),
    /// Advertisement carries no manufacturer data
    NoManufacturerData,
    /// AD structure length runs past the end of the payload
    Malformed,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Length(len) => write!(f, "expected {} bytes, got {}", FRAME_LEN, len),
            DecodeError::UnknownCompany(id) => write!(f, "unknown company id {:#06x}", id),
            DecodeError::NoManufacturerData => write!(f, "no manufacturer data"),
            DecodeError::Malformed => write!(f, "malformed advertising data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// Name longer than [`MAX_NAME_LEN`]
    NameTooLong(usize),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::NameTooLong(len) => {
                write!(f, "device name of {} bytes exceeds {}", len, MAX_NAME_LEN)
            }
        }
    }
}

/// Build the advertising data: flags, complete local name, manufacturer frame.
pub fn payload(name: &str, frame: &[u8; FRAME_LEN]) -> Result<Payload, PayloadError> {
    if name.len() > MAX_NAME_LEN {
        return Err(PayloadError::NameTooLong(name.len()));
    }
    let mut payload = Payload::new();
    // capacity is guaranteed by the name check above
    let _ = push_structure(&mut payload, AD_FLAGS, &[ADVERTISING_FLAGS]);
    let _ = push_structure(&mut payload, AD_COMPLETE_LOCAL_NAME, name.as_bytes());
    let _ = push_structure(&mut payload, AD_MANUFACTURER_DATA, frame);
    Ok(payload)
}

fn push_structure(payload: &mut Payload, kind: u8, data: &[u8]) -> Result<(), ()> {
    payload.push(data.len() as u8 + 1).map_err(|_| ())?;
    payload.push(kind).map_err(|_| ())?;
    payload.extend_from_slice(data)
}

/// Iterate `(type, data)` over length-prefixed AD structures.
pub fn structures(payload: &[u8]) -> Structures<'_> {
    Structures { rest: payload }
}

pub struct Structures<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Structures<'a> {
    type Item = Result<(u8, &'a [u8]), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, tail) = self.rest.split_first()?;
        if len == 0 {
            // zero length terminates significant data
            self.rest = &[];
            return None;
        }
        let len = len as usize;
        if tail.len() < len {
            self.rest = &[];
            return Some(Err(DecodeError::Malformed));
        }
        let (structure, rest) = tail.split_at(len);
        self.rest = rest;
        Some(Ok((structure[0], &structure[1..])))
    }
}

/// Find and decode our frame inside a full advertising payload.
pub fn decode_payload(payload: &[u8]) -> Result<Frame, DecodeError> {
    for structure in structures(payload) {
        let (kind, data) = structure?;
        if kind == AD_MANUFACTURER_DATA {
            return Frame::decode(data);
        }
    }
    Err(DecodeError::NoManufacturerData)
}
