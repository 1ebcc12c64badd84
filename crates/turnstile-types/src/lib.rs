//! # turnstile-types
//!
//! Channel domain entities shared across all Turnstile subsystems.
//!
//! ## Clusters
//!
//! - **Entities**: fixed part, states, stages, destinations
//! - **Outcomes**: per-asset allocation lists
//! - **Signed states**: states plus recoverable signatures
//! - **Objectives**: the closed set of multi-step goals
//! - **Wire**: the peer-to-peer message payload

pub mod chain;
pub mod entities;
pub mod errors;
pub mod objective;
pub mod outcome;
pub mod signed_state;
pub mod wire;

// Re-export main types
pub use chain::{ChainEvent, ChainTransaction, TxHandle};
pub use entities::{
    Address, ChannelId, Destination, FixedPart, Hash, Participant, Signature, Stage, State, U256,
    ADDRESS_ZERO, HASH_ZERO,
};
pub use errors::WireError;
pub use objective::{
    CloseChannel, Defund, FundLedgerChannel, FundVirtualChannel, FundingStrategy, Objective,
    ObjectiveOutcome, OpenChannel,
};
pub use outcome::{Allocation, AssetAllocation, Outcome};
pub use signed_state::SignedState;
pub use wire::{Message, Notice, WALLET_VERSION};
