use std::net::{IpAddr, SocketAddr};

use aguada_api::radio::channel_port;
use aguada_embedded::DEFAULT_SAMPLES;
use serde::{Deserialize, Serialize};

use crate::errors::MockError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Radio {
    pub target: String,
    pub channel: u8,
    pub base_port: u16,
}

impl Radio {
    pub fn target_addr(&self) -> Result<SocketAddr, MockError> {
        let ip: IpAddr = self.target.parse()?;

        Ok(SocketAddr::new(ip, channel_port(self.base_port, self.channel)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

fn default_samples() -> u8 {
    DEFAULT_SAMPLES
}

/// One simulated transducer mounted over a tank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimChannel {
    pub channel: u8,
    pub tank_depth_cm: f64,
    /// Gap between the transducer and the brim
    pub sensor_offset_cm: f64,
    #[serde(default = "default_samples")]
    pub samples: u8,
    pub valid_min_cm: f32,
    pub valid_max_cm: f32,
    #[serde(default)]
    pub noise_cm: f64,
    /// Period of one fill/drain cycle
    pub cycle_secs: u64,
    /// Share of trigger pulses that get no echo at all
    #[serde(default)]
    pub dropout_rate: f64,
    /// Share of trigger pulses that leave the echo line latched high
    #[serde(default)]
    pub latch_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub mac: String,
    pub interval_secs: u64,
    pub channels: Vec<SimChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub radio: Radio,
    pub backend: Backend,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Settings {
    pub fn new() -> Result<Self, MockError> {
        Self::from_toml(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/mock.toml"
        )))
    }

    pub fn from_toml(source: &str) -> Result<Self, MockError> {
        Ok(toml::from_str(source)?)
    }
}
