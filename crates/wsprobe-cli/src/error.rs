//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Test execution ran but samples failed
    #[error("Test execution failed: {message}")]
    TestExecution {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// wsprobe library error
    #[error("{0}")]
    Probe(#[from] wsprobe::ProbeError),
}

impl CliError {
    /// Create a test execution error
    #[must_use]
    pub fn test_execution(message: impl Into<String>) -> Self {
        Self::TestExecution {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_execution_error() {
        let err = CliError::test_execution("2 of 6 samples failed");
        assert!(err.to_string().contains("Test execution"));
        assert!(err.to_string().contains("2 of 6"));
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("users must be positive");
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_probe_error_passes_through() {
        let err: CliError = wsprobe::ProbeError::invalid_config("plan has no samples").into();
        assert!(err.to_string().contains("plan has no samples"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }
}
