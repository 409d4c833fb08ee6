// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Sensor capabilities consumed by the sampler, and the I²C drivers providing them.

mod dummy;
mod pm25;
mod sgp40;

use std::time::Duration;

use crate::FieldValue;

pub use dummy::{dummy_sensors, DummyParticulateSensor, DummyVocSensor};
pub use pm25::{Pm25, Pm25Frame, PM25_ADDRESS, PM25_FIELDS};
pub use sgp40::{crc8, Sgp40, SGP40_ADDRESS};

/// Named values from one sensor read, in the order the sensor reports them.
pub type Readings = Vec<(String, FieldValue)>;

/// Errors a single sensor read can fail with. All of them are transient from the sampler's point
/// of view.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("i2c bus error: {0}")]
    Bus(embedded_hal::i2c::ErrorKind),

    #[error("invalid frame: {0}")]
    Framing(String),

    #[error("checksum mismatch: expected {expected:#06x}, computed {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },

    #[error("read did not complete within {0:?}")]
    Timeout(Duration),

    /// An earlier read is still holding the sensor.
    #[error("sensor is still busy with an earlier read")]
    Busy,

    #[error("sensor read crashed: {0}")]
    Crashed(String),
}

impl SensorError {
    pub(crate) fn bus<E: embedded_hal::i2c::Error>(error: E) -> Self {
        Self::Bus(error.kind())
    }
}

/// A particulate matter sensor.
///
/// To be implemented for each sensor model.
pub trait ParticulateSensor {
    /// Reads the current measurement. Field names are as the device documents them and may
    /// contain spaces.
    fn read(&mut self) -> Result<Readings, SensorError>;
}

/// A volatile organic compound sensor.
pub trait VocSensor {
    /// Reads the raw, uncompensated VOC signal.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

pub type ParticulateSensorPointer = Box<dyn ParticulateSensor + Send>;
pub type VocSensorPointer = Box<dyn VocSensor + Send>;

impl<S: ParticulateSensor + ?Sized> ParticulateSensor for Box<S> {
    fn read(&mut self) -> Result<Readings, SensorError> {
        (**self).read()
    }
}

impl<S: VocSensor + ?Sized> VocSensor for Box<S> {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        (**self).read_raw()
    }
}
