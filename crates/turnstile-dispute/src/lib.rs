//! # turnstile-dispute
//!
//! The challenge/respond/refute/checkpoint/conclude machine. This mirrors
//! the on-chain adjudicator exactly: the engine issues transactions, but the
//! chain is the final authority, so any divergence between this machine and
//! the contract is exploitable for fund loss.
//!
//! Used in two places with the same code path:
//! - the engine, to reject a transaction locally before wasting gas on a
//!   revert, and to track the on-chain record mirrored from events;
//! - the in-memory mock chain, as its actual adjudication logic in tests.

pub mod challenge;
pub mod error;
pub mod machine;

// Re-export main types
pub use challenge::ChallengeRecord;
pub use error::{DisputeError, DisputeResult};
pub use machine::Adjudicator;
