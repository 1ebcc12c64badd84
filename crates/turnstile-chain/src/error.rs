//! Error types for the chain service.

use thiserror::Error;

/// Errors surfaced by transaction submission.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The adjudicator rejected the transaction; retrying cannot succeed.
    #[error("Transaction reverted: {reason}")]
    Revert { reason: String },

    /// Transient infrastructure failure (nonce conflict, RPC timeout);
    /// retried with backoff by the submitter.
    #[error("Transient submission failure: {0}")]
    Transient(String),

    /// Retries exhausted. Surfaced to the objective as recoverable: the
    /// objective stays open and re-cranking submits again.
    #[error("Chain submission failed after {attempts} attempts: {reason}")]
    SubmissionFailed { attempts: u32, reason: String },
}

impl ChainError {
    /// True for failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
