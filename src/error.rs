//! Error types for medir
//!
//! One taxonomy for the whole pipeline. Launch and I/O failures are fatal;
//! whether a non-zero child exit aborts a sweep is the scheduler's policy,
//! not the error's.

use std::process::ExitStatus;

use thiserror::Error;

/// Result type alias for medir operations
pub type Result<T> = std::result::Result<T, MedirError>;

/// Error type for benchmark orchestration, aggregation, and verification
#[derive(Debug, Error)]
pub enum MedirError {
    /// Binary missing, not executable, or spawn failed
    #[error("failed to launch '{binary}': {message}")]
    LaunchError {
        /// Program that could not be started
        binary: String,
        /// OS-level failure description
        message: String,
    },

    /// Child process completed with a non-zero status
    #[error("'{command}' failed ({status})")]
    NonZeroExit {
        /// Full command line that was executed
        command: String,
        /// Exit status reported by the OS
        status: ExitStatus,
    },

    /// Expected numeric content was absent or malformed
    #[error("parse error: {message}")]
    ParseError {
        /// What failed to parse and where
        message: String,
    },

    /// Matrix shapes are incompatible for verification
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Shape the operation required
        expected: String,
        /// Shape actually found
        actual: String,
    },

    /// File or directory operation failed
    #[error("I/O error: {message}")]
    IoError {
        /// Path and OS failure description
        message: String,
    },

    /// Sweep or verification parameters are unusable
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_display() {
        let err = MedirError::LaunchError {
            binary: "./bin/matmul_seq".to_string(),
            message: "No such file or directory".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("./bin/matmul_seq"));
        assert!(msg.contains("No such file or directory"));
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = MedirError::DimensionMismatch {
            expected: "100x100".to_string(),
            actual: "100x99".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: expected 100x100, got 100x99"
        );
    }

    #[test]
    fn test_invalid_configuration_display() {
        let err = MedirError::InvalidConfiguration("repetitions must be at least 1".to_string());
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
