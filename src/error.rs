//! Error types for the proxy pool

use thiserror::Error;

/// Unified error type for proxy-rotor
#[derive(Error, Debug)]
pub enum Error {
    #[error("Provider {name} failed: {reason}")]
    Provider { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a provider error from any displayable failure
    pub fn provider(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Provider {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
