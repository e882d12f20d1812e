mod supervisor;

pub use supervisor::*;

use alloc::string::String;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMode {
    Open,
    Wpa2Personal,
}

/// One upstream network the gateway may join, tried in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCandidate {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl NetworkCandidate {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Networks without a password are joined unauthenticated.
    pub fn auth_mode(&self) -> AuthMode {
        if self.password.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::Wpa2Personal
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait WifiController {
    type Error: core::fmt::Debug;

    /// Start the local access point; it stays up whatever the station does
    async fn start_ap(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Join a network; resolves once associated and addressed, or on rejection
    async fn connect_station(
        &mut self,
        ssid: &str,
        password: &str,
        auth: AuthMode,
    ) -> Result<(), Self::Error>;

    /// Leave the current network, if any
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Check if the station is currently associated
    fn is_connected(&self) -> bool;
}
