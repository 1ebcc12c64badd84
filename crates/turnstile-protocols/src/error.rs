//! Error types for the protocol engine.

use thiserror::Error;
use turnstile_store::StoreError;

/// Errors raised while validating or progressing a protocol.
///
/// These are local-only: they reject the offending input and are never
/// retried, since re-submitting malformed input cannot succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The proposed update is not the immediate successor of the supported
    /// state.
    #[error("Out-of-turn update: expected turn {expected_turn}, got {actual_turn}")]
    OutOfTurnUpdate { expected_turn: u64, actual_turn: u64 },

    /// The proposer is not the mover at this turn.
    #[error("Not my turn: turn {turn_num} moves participant {mover_index}")]
    NotMyTurn { turn_num: u64, mover_index: usize },

    /// The update changes allocation totals without app approval.
    #[error("Outcome not conserved at turn {turn_num}")]
    OutcomeNotConserved { turn_num: u64 },

    /// The app validator refused the transition.
    #[error("App validator rejected transition to turn {turn_num}")]
    AppRejected { turn_num: u64 },

    /// The ledger channel cannot cover the requested guarantee.
    #[error("Ledger channel cannot cover the guarantee")]
    InsufficientLedgerFunds,

    /// The channel is not in a stage this operation applies to.
    #[error("Channel not ready: {0}")]
    ChannelNotReady(&'static str),

    /// The underlying record refused the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
