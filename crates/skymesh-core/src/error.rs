//! Error types for the Skymesh bridge.
//!
//! Errors are grouped by concern. Connection errors are always retried by the
//! reconnect loops; parse errors are dropped at the record or field level;
//! configuration errors are fatal at startup only.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using SkymeshError as the error type.
pub type Result<T> = std::result::Result<T, SkymeshError>;

/// Top-level error type for all Skymesh operations.
#[derive(Debug, Error)]
pub enum SkymeshError {
    /// Connection-related errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to the two network endpoints.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// Failed to establish or use a connection
    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// Connection refused by the remote end
    #[error("Connection refused by {address}")]
    ConnectionRefused { address: String },

    /// Connection was closed by the remote end
    #[error("Connection closed: {reason}")]
    ConnectionClosed { reason: String },

    /// Connection was reset by peer
    #[error("Connection reset by peer")]
    ConnectionReset,

    /// Connect, handshake, read or write took too long
    #[error("{operation} timed out after {timeout_ms}ms")]
    ConnectionTimeout { operation: &'static str, timeout_ms: u64 },

    /// Frame or line larger than the protocol allows
    #[error("Frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },
}

impl ConnectionError {
    /// Creates a connection failed error.
    pub fn failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    /// Creates a timeout error for `operation`.
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::ConnectionTimeout {
            operation,
            timeout_ms: after.as_millis().min(u64::MAX as u128) as u64,
        }
    }

    /// Classifies an I/O error raised on the connection to `address`.
    ///
    /// A `ConnectionError` carried inside the I/O error (as codecs do) is
    /// returned as is.
    pub fn from_io(address: impl Into<String>, err: &io::Error) -> Self {
        if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<ConnectionError>()) {
            return inner.clone();
        }
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused {
                address: address.into(),
            },
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => {
                Self::ConnectionReset
            }
            io::ErrorKind::UnexpectedEof => Self::closed(err.to_string()),
            _ => Self::failed(address, err.to_string()),
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Oversized frames mean the peer speaks a different protocol; retrying
    /// will not help, though the reconnect loops still back off and retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ConnectionError::FrameTooLarge { .. })
    }
}

/// Errors raised while interpreting input data.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Invalid 24-bit transponder address
    #[error("Invalid ICAO address '{value}'")]
    InvalidIcao { value: String },
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
