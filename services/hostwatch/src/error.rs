//! Error types for the hostwatch service

use crate::notifier::Channel;

/// Errors that can occur in the hostwatch service
#[derive(Debug, thiserror::Error)]
pub enum HostwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel '{0}' has no endpoint configured")]
    ChannelUnconfigured(Channel),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for hostwatch operations
pub type Result<T> = std::result::Result<T, HostwatchError>;
