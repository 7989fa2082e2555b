//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Abacus operations
#[derive(Error, Debug)]
pub enum AbacusError {
    /// I/O errors (permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Malformed input rows (wrong field count, unparsable numbers)
    #[error("Parse error in {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Invalid data errors (SNP count mismatch, decreasing genetic map, empty donor set)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Numeric degeneracy (singular Hessian, non-finite likelihood, undefined average)
    #[error("Numeric error at {context}: {message}")]
    Numeric { context: String, message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Isolated per-haplotype or per-site failures, already reported individually
    #[error("{stage}: {failed} of {total} tasks failed")]
    TaskFailures {
        stage: &'static str,
        failed: usize,
        total: usize,
    },
}

/// Type alias for Results using AbacusError
pub type Result<T> = std::result::Result<T, AbacusError>;

impl AbacusError {
    /// Create a parse error for a 1-based line of a file
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a numeric error attached to a site or haplotype
    pub fn numeric(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Numeric {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a file-not-found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AbacusError::parse("panel.haps", 3, "expected 0 or 1");
        assert_eq!(
            err.to_string(),
            "Parse error in panel.haps at line 3: expected 0 or 1"
        );

        let err = AbacusError::TaskFailures {
            stage: "painting",
            failed: 2,
            total: 10,
        };
        assert_eq!(err.to_string(), "painting: 2 of 10 tasks failed");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: AbacusError = io.into();
        assert!(matches!(err, AbacusError::Io(_)));
    }
}
