//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by hashing, encoding and signature operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Secret key bytes do not form a valid scalar.
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Signature bytes are malformed (bad r/s or recovery byte).
    #[error("Invalid signature encoding")]
    InvalidSignature,

    /// No public key could be recovered from the signature.
    #[error("Signature recovery failed")]
    RecoveryFailed,
}
