#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid gateway setup: {0}")]
    Setup(#[from] aguada_embedded::Error),

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}
