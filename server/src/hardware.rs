//! Opens the real sensors on a Linux I²C bus.

use std::path::Path;

use airq_common::sensor::{ParticulateSensorPointer, VocSensorPointer};

#[cfg(feature = "hardware")]
pub fn open(bus: &Path) -> anyhow::Result<(ParticulateSensorPointer, VocSensorPointer)> {
    use airq_common::sensor::{Pm25, Sgp40};
    use anyhow::Context;
    use linux_embedded_hal::{Delay, I2cdev};

    // Each driver gets its own handle; the kernel serializes transfers on the bus.
    let pm25 = I2cdev::new(bus)
        .with_context(|| format!("opening {} for the pm25 sensor", bus.display()))?;
    let sgp40 = I2cdev::new(bus)
        .with_context(|| format!("opening {} for the sgp40 sensor", bus.display()))?;

    log::info!("reading sensors on {}", bus.display());

    Ok((Box::new(Pm25::new(pm25)), Box::new(Sgp40::new(sgp40, Delay))))
}

#[cfg(not(feature = "hardware"))]
pub fn open(bus: &Path) -> anyhow::Result<(ParticulateSensorPointer, VocSensorPointer)> {
    anyhow::bail!(
        "cannot open {}: built without hardware support, set `sensors.dummy = true`",
        bus.display()
    )
}
