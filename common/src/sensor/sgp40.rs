// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Sensirion SGP40 VOC sensor on I²C.

use embedded_hal::{delay::DelayNs, i2c::I2c};

use super::{SensorError, VocSensor};

pub const SGP40_ADDRESS: u8 = 0x59;

const MEASURE_RAW: [u8; 2] = [0x26, 0x0F];
const MEASURE_DELAY_MS: u32 = 30;

/// Compensation ticks for 50 %RH and 25 °C, used when nothing better is known.
const DEFAULT_HUMIDITY_TICKS: u16 = 0x8000;
const DEFAULT_TEMPERATURE_TICKS: u16 = 0x6666;

/// Sensirion CRC-8: polynomial 0x31, initial value 0xFF, no final xor.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn humidity_ticks(relative_humidity: f32) -> u16 {
    (relative_humidity.clamp(0.0, 100.0) * 65535.0 / 100.0).round() as u16
}

fn temperature_ticks(celsius: f32) -> u16 {
    ((celsius.clamp(-45.0, 130.0) + 45.0) * 65535.0 / 175.0).round() as u16
}

pub struct Sgp40<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Sgp40<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: SGP40_ADDRESS,
        }
    }

    /// Measures the raw signal compensated for the given ambient conditions.
    pub fn measure_raw(&mut self, relative_humidity: f32, celsius: f32) -> Result<u16, SensorError> {
        self.measure(humidity_ticks(relative_humidity), temperature_ticks(celsius))
    }

    fn measure(&mut self, humidity: u16, temperature: u16) -> Result<u16, SensorError> {
        let [h0, h1] = humidity.to_be_bytes();
        let [t0, t1] = temperature.to_be_bytes();
        let command = [
            MEASURE_RAW[0],
            MEASURE_RAW[1],
            h0,
            h1,
            crc8(&[h0, h1]),
            t0,
            t1,
            crc8(&[t0, t1]),
        ];

        self.i2c
            .write(self.address, &command)
            .map_err(SensorError::bus)?;
        self.delay.delay_ms(MEASURE_DELAY_MS);

        let mut response = [0u8; 3];
        self.i2c
            .read(self.address, &mut response)
            .map_err(SensorError::bus)?;

        let [msb, lsb, crc] = response;
        let computed = crc8(&[msb, lsb]);
        if crc != computed {
            return Err(SensorError::Checksum {
                expected: crc.into(),
                actual: computed.into(),
            });
        }
        Ok(u16::from_be_bytes([msb, lsb]))
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C: I2c, D: DelayNs> VocSensor for Sgp40<I2C, D> {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.measure(DEFAULT_HUMIDITY_TICKS, DEFAULT_TEMPERATURE_TICKS)
    }
}
