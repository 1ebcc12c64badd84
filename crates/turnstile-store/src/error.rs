//! Error types for the channel store.

use thiserror::Error;
use turnstile_types::Address;

/// Errors raised when mutating a channel record.
///
/// All of these reject the offending input and leave the record unchanged;
/// none are retryable, since re-submitting malformed input cannot succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Turn number is not the immediate successor of a stored state.
    #[error("Invalid transition: expected turn {expected_turn}, got {actual_turn}")]
    InvalidTransition { expected_turn: u64, actual_turn: u64 },

    /// A different state is already stored at this turn number.
    #[error("Conflicting state at turn {turn_num}")]
    ConflictingState { turn_num: u64 },

    /// The state names a different channel than this record.
    #[error("State belongs to a different channel")]
    WrongChannel,

    /// Turn number is below the already-established supported state.
    #[error("Stale state: turn {actual_turn} below supported turn {supported_turn}")]
    StaleState { supported_turn: u64, actual_turn: u64 },

    /// A signature does not recover to a declared participant.
    #[error("Invalid signature: recovered signer {signer:?} is not a participant")]
    SignatureInvalid { signer: Address },

    /// A signature's encoding is malformed beyond recovery.
    #[error("Invalid signature: recovery failed")]
    SignatureUnrecoverable,

    /// No state is stored at the turn the caller asked to countersign.
    #[error("No state stored at turn {turn_num}")]
    MissingState { turn_num: u64 },

    /// The local participant is not the mover at this turn.
    #[error("Not my turn: turn {turn_num} moves participant {mover_index}")]
    NotMyTurn { turn_num: u64, mover_index: usize },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
