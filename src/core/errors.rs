//! Error types for the norn driver.
//!
//! One structured error enum covers every failure class the driver can hit,
//! from catalog registration problems caught at startup to worker failures
//! that abort a parallel run.

use std::io;

use thiserror::Error;

/// Main result type for norn operations.
pub type Result<T> = std::result::Result<T, NornError>;

/// Comprehensive error type for all norn operations.
#[derive(Error, Debug)]
pub enum NornError {
    /// I/O related errors (file operations, etc.)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Message-definition registration errors, fatal at startup
    #[error("Registration error for '{subject}': {message}")]
    Registration {
        /// Message id or symbol being registered
        subject: String,
        /// Error description
        message: String,
    },

    /// Lookup of a message id or symbol the catalog has never seen
    #[error("Unknown message: {name}")]
    UnknownMessage {
        /// The id, symbol, or alias that failed to resolve
        name: String,
    },

    /// Parsing errors for a single guest-language file
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// File path where the error occurred
        path: String,
        /// Error description
        message: String,
        /// Line number (if available)
        line: Option<usize>,
        /// Column number (if available)
        column: Option<usize>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Worker-pool failures; always fatal to the run
    #[error("Worker failure: {message}")]
    Worker {
        /// Error description
        message: String,
        /// Worker identifier (if known)
        worker_id: Option<usize>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl NornError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new registration error
    pub fn registration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registration {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a new unknown-message error
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownMessage { name: name.into() }
    }

    /// Create a new parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a new parse error with a source location
    pub fn parse_at(
        path: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new worker failure
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
            worker_id: None,
        }
    }

    /// Create a new worker failure attributed to a specific worker
    pub fn worker_id(message: impl Into<String>, worker_id: usize) -> Self {
        Self::Worker {
            message: message.into(),
            worker_id: Some(worker_id),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<io::Error> for NornError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for NornError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for NornError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let err = NornError::registration("C0101", "duplicate symbol");
        assert_eq!(
            err.to_string(),
            "Registration error for 'C0101': duplicate symbol"
        );

        let err = NornError::parse_at("m.nn", "unexpected indent", 3, 7);
        assert!(err.to_string().contains("m.nn"));
    }

    #[test]
    fn io_errors_convert() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: NornError = io_err.into();
        assert!(matches!(err, NornError::Io { .. }));
    }
}
