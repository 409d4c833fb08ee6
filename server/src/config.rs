use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Contents of the configuration file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
}

/// Where the HTTP server listens.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub listen: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    /// I²C bus device both sensors are attached to.
    pub bus: PathBuf,
    /// Use canned readings instead of the hardware.
    pub dummy: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus: PathBuf::from("/dev/i2c-1"),
            dummy: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
