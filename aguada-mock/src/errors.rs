#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Failed to parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid radio target: {0}")]
    Target(#[from] std::net::AddrParseError),

    #[error("Invalid node address: {0}")]
    Address(#[from] aguada_api::PacketError),

    #[error("Invalid noise level: {0} cm")]
    NoiseLevel(f64),

    #[error("Invalid noise distribution: {0}")]
    Noise(#[from] rand_distr::NormalError),

    #[error("Sensor setup failed: {0}")]
    Sensor(#[from] aguada_embedded::RangeFailure),

    #[error("Invalid node setup: {0}")]
    Setup(#[from] aguada_embedded::Error),
}
