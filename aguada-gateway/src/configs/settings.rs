use std::env;
use std::path::Path;
use std::time::Duration;

use aguada_api::radio::{DEFAULT_BASE_PORT, DEFAULT_CHANNEL, channel_port, is_valid_channel};
use aguada_embedded::NetworkCandidate;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Radio {
    pub channel: u8,
    pub bind_host: String,
    pub base_port: u16,
    /// Overrides the channel plan port, e.g. `0` for an ephemeral port
    pub port: Option<u16>,
}

impl Radio {
    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| channel_port(self.base_port, self.channel))
    }
}

impl Default for Radio {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL,
            bind_host: String::from("0.0.0.0"),
            base_port: DEFAULT_BASE_PORT,
            port: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    /// Uplink managed by the host OS
    Static,
    /// Wi-Fi managed through NetworkManager
    Nmcli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub password: String,
    /// Defaults to the station interface
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub controller: ControllerKind,
    pub interface: String,
    pub access_point: Option<AccessPoint>,
    #[serde(default)]
    pub candidates: Vec<NetworkCandidate>,
    pub association_timeout_secs: u64,
    pub retry_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    pub urls: Vec<String>,
    pub timeout_secs: u64,
}

impl Backend {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    #[serde(default)]
    pub radio: Radio,
    pub network: Network,
    pub backend: Backend,
    pub status: Status,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        Self::load(Path::new("configs"), &run_mode)
    }

    /// Layers `default.toml`, the optional `{run_mode}.toml` and `AGUADA__*` environment
    /// variables found under `dir`.
    pub fn load(dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(dir.join("default")))
            .add_source(File::from(dir.join(run_mode)).required(false))
            .add_source(Environment::with_prefix("AGUADA").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_channel(self.radio.channel) {
            return Err(ConfigError::Message(format!(
                "radio.channel {} is not a valid channel",
                self.radio.channel
            )));
        }

        if self.backend.urls.is_empty() {
            return Err(ConfigError::Message(
                "backend.urls must list at least one URL".into(),
            ));
        }

        if let Some(index) = self.network.candidates.iter().position(|c| c.ssid.is_empty()) {
            return Err(ConfigError::Message(format!(
                "network.candidates[{index}] has an empty ssid"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn configs_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs")
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::load(&configs_dir(), "test-none").unwrap();

        assert_eq!(settings.radio.channel, DEFAULT_CHANNEL);
        assert_eq!(settings.radio.port(), 47_011);
        assert_eq!(settings.network.controller, ControllerKind::Static);
        assert_eq!(settings.network.association_timeout_secs, 10);
        assert_eq!(settings.network.retry_interval_secs, 10);
        assert_eq!(settings.backend.timeout(), Duration::from_secs(5));
        assert_eq!(settings.status.interval_secs, 30);
        assert!(!settings.backend.urls.is_empty());

        let ssids: Vec<&str> = settings
            .network
            .candidates
            .iter()
            .map(|c| c.ssid.as_str())
            .collect();
        assert_eq!(ssids, ["TP-LINK_BE3344", "luciano"]);

        let ap = settings.network.access_point.unwrap();
        assert_eq!(ap.ssid, "GTW-01");
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::load(&configs_dir(), "test-none").unwrap();

        settings.radio.channel = 0;
        assert!(settings.validate().is_err());

        settings.radio.channel = 6;
        settings.backend.urls.clear();
        assert!(settings.validate().is_err());

        settings.backend.urls.push("http://localhost:3000/api/leituras/raw".into());
        assert!(settings.validate().is_ok());

        settings.network.candidates.push(NetworkCandidate::new("", "secret"));
        assert!(settings.validate().is_err());
    }
}
