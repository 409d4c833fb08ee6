// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use serde::Deserialize;

use super::{ParticulateSensor, Readings, SensorError, VocSensor};

#[derive(Deserialize)]
struct Fixture {
    particulate: Vec<(String, i64)>,
    tvoc: u16,
}

/// Particulate sensor returning canned readings, for running without hardware.
#[derive(Clone, Debug, Default)]
pub struct DummyParticulateSensor {
    readings: Vec<(String, i64)>,
}

/// VOC sensor returning a canned raw value.
#[derive(Clone, Debug, Default)]
pub struct DummyVocSensor {
    raw: u16,
}

/// Loads both dummy sensors from the embedded fixture.
pub fn dummy_sensors() -> Result<(DummyParticulateSensor, DummyVocSensor), serde_json::Error> {
    let json_data = std::include_str!("./dummy_sensors.json");

    let fixture = serde_json::from_str::<Fixture>(json_data)?;
    Ok((
        DummyParticulateSensor {
            readings: fixture.particulate,
        },
        DummyVocSensor { raw: fixture.tvoc },
    ))
}

impl ParticulateSensor for DummyParticulateSensor {
    fn read(&mut self) -> Result<Readings, SensorError> {
        Ok(self
            .readings
            .iter()
            .map(|(name, value)| (name.clone(), (*value).into()))
            .collect())
    }
}

impl VocSensor for DummyVocSensor {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        Ok(self.raw)
    }
}

#[test]
fn test_dummy_sensors() {
    let (mut particulate, mut voc) = dummy_sensors().unwrap();
    let readings = particulate.read().unwrap();

    assert_eq!(readings.len(), super::PM25_FIELDS.len());
    assert_eq!(readings[1].0, "pm25 standard");
    assert_eq!(voc.read_raw().unwrap(), 31245);
}
