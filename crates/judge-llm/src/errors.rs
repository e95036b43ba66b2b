//! Error taxonomy for model calls.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    pub message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SDKError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("{provider} returned HTTP {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("stream error: {0}")]
    Stream(String),
}

impl SDKError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::new(message))
    }

    /// Whether the failure happened before the provider accepted the request.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<reqwest::Error> for SDKError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
