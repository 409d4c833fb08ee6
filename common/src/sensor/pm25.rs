// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! PMSA003I particulate sensor on I²C.
//!
//! The sensor answers every read with a 32 byte frame:
//!
//! | bytes  | content                                     |
//! |--------|---------------------------------------------|
//! | 0..2   | start characters `BM`                       |
//! | 2..4   | payload length, always 28                   |
//! | 4..28  | twelve big endian `u16` data words          |
//! | 28..30 | reserved                                    |
//! | 30..32 | sum of bytes 0..30                          |

use embedded_hal::i2c::I2c;

use super::{ParticulateSensor, Readings, SensorError};

pub const PM25_ADDRESS: u8 = 0x12;

const FRAME_LEN: usize = 32;
const START: [u8; 2] = *b"BM";
const PAYLOAD_LEN: u16 = 28;

/// Names of the data words, in frame order.
pub const PM25_FIELDS: [&str; 12] = [
    "pm10 standard",
    "pm25 standard",
    "pm100 standard",
    "pm10 env",
    "pm25 env",
    "pm100 env",
    "particles 03um",
    "particles 05um",
    "particles 10um",
    "particles 25um",
    "particles 50um",
    "particles 100um",
];

/// A validated measurement frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pm25Frame {
    values: [u16; 12],
}

impl Pm25Frame {
    pub fn parse(frame: &[u8; FRAME_LEN]) -> Result<Self, SensorError> {
        if frame[..2] != START {
            return Err(SensorError::Framing(format!(
                "unexpected start characters {:#04x} {:#04x}",
                frame[0], frame[1]
            )));
        }

        let length = u16::from_be_bytes([frame[2], frame[3]]);
        if length != PAYLOAD_LEN {
            return Err(SensorError::Framing(format!(
                "payload length {length}, expected {PAYLOAD_LEN}"
            )));
        }

        let expected = u16::from_be_bytes([frame[30], frame[31]]);
        let actual = frame[..30]
            .iter()
            .fold(0u16, |sum, &byte| sum.wrapping_add(byte.into()));
        if expected != actual {
            return Err(SensorError::Checksum { expected, actual });
        }

        let mut values = [0; 12];
        for (value, word) in values.iter_mut().zip(frame[4..28].chunks_exact(2)) {
            *value = u16::from_be_bytes([word[0], word[1]]);
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        PM25_FIELDS
            .iter()
            .position(|field| *field == name)
            .map(|index| self.values[index])
    }

    pub fn readings(&self) -> Readings {
        PM25_FIELDS
            .iter()
            .zip(self.values)
            .map(|(name, value)| (name.to_string(), value.into()))
            .collect()
    }
}

pub struct Pm25<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pm25<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, PM25_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn read_frame(&mut self) -> Result<Pm25Frame, SensorError> {
        let mut frame = [0; FRAME_LEN];
        self.i2c
            .read(self.address, &mut frame)
            .map_err(SensorError::bus)?;
        Pm25Frame::parse(&frame)
    }

    /// Gives back the bus handle.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> ParticulateSensor for Pm25<I2C> {
    fn read(&mut self) -> Result<Readings, SensorError> {
        Ok(self.read_frame()?.readings())
    }
}
