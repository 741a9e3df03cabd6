//! Error types for the build canceller

use thiserror::Error;

/// Result type alias using the canceller's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Canceller error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error (transport or server-side rejection)
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// A client connection could not be obtained
    #[error("Connection error: {0}")]
    Connection(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Build not found on re-read
    #[error("Build not found: {0}")]
    BuildNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
