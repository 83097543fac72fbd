//! # Error Types
//!
//! Error handling for the framing, dispatch and session layers.
//!
//! ## Error Categories
//! - **Framing Errors**: oversized declared bodies, reuse of a corrupt decoder.
//!   These are session-fatal: the owning session closes the connection.
//! - **Encoding Errors**: inconsistent packages handed to the encoder. These are
//!   caller defects and are reported before any byte is written.
//! - **Dispatch Errors**: missing routes and failing handlers. These are isolated
//!   to a single package and never reach the decode loop.
//! - **I/O and Configuration Errors**
//!
//! A stream that ends in the middle of a frame is a normal end-of-stream and has
//! no error variant.
//!
//! ## Example Usage
//! ```rust
//! use package_protocol::error::ProtocolError;
//!
//! let err = ProtocolError::OversizedMessage { declared: 2048, max: 1024 };
//! assert!(err.is_session_fatal());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Encoder validation messages
    pub const ERR_BODY_LENGTH_MISMATCH: &str = "Declared body length does not match body";
    pub const ERR_BODY_TOO_LARGE: &str = "Body exceeds maximum body length";
    pub const ERR_BODY_EXCEEDS_WIRE_LIMIT: &str = "Body does not fit in a 16-bit length field";

    /// Registry messages
    pub const ERR_DUPLICATE_ROUTE: &str = "Handler already registered for route";
    pub const ERR_ID_ROUTE_UNDER_TYPE_ONLY: &str =
        "Id-specific route cannot be registered under the type_only routing policy";

    /// Session messages
    pub const ERR_SESSION_TASK_FAILED: &str = "Session task terminated abnormally";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Message body of {declared} bytes exceeds maximum of {max} bytes")]
    OversizedMessage { declared: u16, max: u16 },

    #[error("Decoder is corrupt and cannot accept further input")]
    DecoderCorrupt,

    #[error("Encode validation failed: {0}")]
    EncodeValidation(String),

    #[error("No handler registered for id={id} type={kind}")]
    DispatchMiss { id: u16, kind: u8 },

    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error forces the owning session to close its connection.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::OversizedMessage { .. } | ProtocolError::DecoderCorrupt
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
