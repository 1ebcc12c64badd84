//! Error types for the dispute machine.
//!
//! The display strings of the on-chain violations match the adjudicator's
//! revert reasons byte-for-byte: the engine mirrors every check locally
//! before submitting, and a transaction that would revert with one of these
//! must be rejected here with the same reason.

use thiserror::Error;

/// Dispute protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisputeError {
    /// Candidate lacks full support or does not exceed the stored record.
    #[error("Invalid challenge: turn {candidate_turn} does not exceed record {turn_num_record}, or support is incomplete")]
    InvalidChallenge {
        candidate_turn: u64,
        turn_num_record: u64,
    },

    /// No challenge is active for this channel.
    #[error("No ongoing challenge")]
    ChallengeNotOngoing,

    /// The response was not signed by the mover whose turn it is.
    #[error("Response not signed by authorized mover")]
    ResponseUnauthorized,

    /// The response is not the immediate successor of the challenge state.
    #[error("Invalid response: expected turn {expected_turn}, got {actual_turn}")]
    InvalidResponse { expected_turn: u64, actual_turn: u64 },

    /// The challenge already expired when the refutation arrived.
    #[error("Refute too late!")]
    RefuteTooLate,

    /// The declared turn-number record does not match on-chain storage.
    #[error("Challenge State does not match stored version")]
    StateMismatch { declared: u64, stored: u64 },

    /// The refutation was not signed by the recorded challenger.
    #[error("Refutation state not signed by challenger")]
    UnauthorizedSigner,

    /// The refutation's turn number does not exceed the declared record.
    #[error("Refutation turn {refutation_turn} not larger than record {turn_num_record}")]
    RefutationTurnTooLow {
        refutation_turn: u64,
        turn_num_record: u64,
    },

    /// The channel has already finalized; no further transitions apply.
    #[error("Channel already finalized")]
    AlreadyFinalized,

    /// A conclusion needs a final state signed by every participant.
    #[error("Conclusion requires a unanimously signed final state")]
    InvalidConclusion,
}

/// Result type for dispute operations.
pub type DisputeResult<T> = Result<T, DisputeError>;
