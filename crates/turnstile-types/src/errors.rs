//! # Error Types
//!
//! Errors raised at the wire boundary, before a message reaches any channel.

use thiserror::Error;

/// Errors related to wire message validation.
#[derive(Debug, Clone, Error)]
pub enum WireError {
    /// Message version not supported.
    #[error("Unsupported wallet version: received {received}, supported {supported}")]
    UnsupportedVersion { received: String, supported: String },

    /// Message payload could not be decoded.
    #[error("Malformed message: {0}")]
    Malformed(String),
}
