//! Error types for the engine API.
//!
//! API calls return a structured failure carrying the error kind and enough
//! context (channel id, expected vs. actual turns) to diagnose without
//! re-deriving channel state.

use thiserror::Error;
use turnstile_dispute::DisputeError;
use turnstile_protocols::ProtocolError;
use turnstile_store::StoreError;
use turnstile_types::WireError;

/// Errors surfaced by engine API calls.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The channel is not tracked by this engine.
    #[error("Unknown channel")]
    UnknownChannel,

    /// No such objective is tracked (or it already retired).
    #[error("Unsupported objective: {objective_id}")]
    ObjectiveUnsupported { objective_id: String },

    /// The local signer is not a participant of the channel.
    #[error("Local signer is not a participant of this channel")]
    NotParticipant,

    /// Locally created channels must list the creator first.
    #[error("Channel creator must be the first participant")]
    CreatorNotFirst,

    /// A proposal's channel id does not match its fixed part.
    #[error("Proposal channel id does not match its fixed part")]
    ChannelIdMismatch,

    /// The channel is not in a stage this call applies to.
    #[error("Channel not ready: {0}")]
    NotReady(&'static str),

    /// Wire-level rejection.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The channel record refused the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Protocol validation rejected the input.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The local dispute mirror rejected the request before submission.
    #[error(transparent)]
    Dispute(#[from] DisputeError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
