//! Error types and result handling for logminer-capture.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use logminer_capture::{Error, Result};
//!
//! fn start_session() -> Result<()> {
//!     // Simulating a connection error
//!     Err(Error::Connection("Failed to connect".to_string()))
//! }
//!
//! match start_session() {
//!     Ok(()) => println!("Started"),
//!     Err(Error::Connection(msg)) => eprintln!("Connection error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for logminer-capture operations.
///
/// This enum represents all possible errors that can occur while mining,
/// from configuration issues to runtime failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, typically from an invalid config file or
    /// a contract violation such as both include and exclude filters set.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database or driver error reported by the catalog/driver boundary.
    #[error("Database error: {0}")]
    Database(String),

    /// Connection establishment failure, including connect timeouts.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No statement text registered for a statement kind / topology pair.
    #[error("No statement registered for {kind} ({strategy})")]
    Statement {
        /// Statement kind name
        kind: String,
        /// Topology strategy name
        strategy: String,
    },

    /// The redo statement grammar could not be parsed.
    #[error("Redo parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
    },

    /// A parsed value did not match the dictionary-declared column type.
    #[error("Cannot convert value {value:?} for column {column}: {message}")]
    TypeConversion {
        /// Column whose value failed conversion
        column: String,
        /// The offending raw value
        value: String,
        /// Description of the conversion failure
        message: String,
    },

    /// A persisted offset map could not be deserialized.
    #[error("Invalid offset: {message}")]
    InvalidOffset {
        /// Description of what was invalid
        message: String,
    },

    /// Session lifecycle violation, e.g. polling before start.
    #[error("Session error: {message}")]
    Session {
        /// Description of the lifecycle violation
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout error: {message}")]
    Timeout {
        /// Description of what timed out
        message: String,
    },

    /// JSON serialization error when encoding payloads.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A convenient Result type alias for logminer-capture operations.
///
/// This is equivalent to `std::result::Result<T, logminer_capture::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
