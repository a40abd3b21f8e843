//! Result and error types for wsprobe.

use thiserror::Error;

/// Result type for wsprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a WebSocket sample
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The target URI could not be built or parsed
    #[error("Invalid URI {uri}: {message}")]
    InvalidUri {
        /// Offending URI (may be partial)
        uri: String,
        /// Error message
        message: String,
    },

    /// Connection to the server could not be established
    #[error("Failed to connect: {message}")]
    ConnectionFailed {
        /// Error message
        message: String,
    },

    /// Transport-level failure on a live connection
    #[error("Transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// Sampler or plan configuration is unusable
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create an invalid URI error
    #[must_use]
    pub fn invalid_uri(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create a connection failure
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Short label naming the failure category in a sample's problem list
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidUri { .. } => "Invalid URI syntax",
            Self::ConnectionFailed { .. } => "Connection failed",
            Self::Transport { .. } | Self::Io(_) => "IO Exception",
            Self::InvalidConfig { .. } => "Cannot parse configuration",
            Self::InvalidState { .. } => "Invalid state",
            Self::Json(_) | Self::Yaml(_) => "Serialization error",
        }
    }
}
