//! # turnstile-chain
//!
//! The chain service boundary: transaction submission with bounded-backoff
//! retries, and adjudicator event feeds as bounded per-subscriber queues.
//!
//! The engine talks only to the [`ChainService`] port. The in-memory
//! [`adapters::MockChain`] implements the full adjudicator semantics (via
//! the dispute machine) for integration tests; production deployments plug
//! an RPC-backed adapter into the same port.

pub mod adapters;
pub mod error;
pub mod ports;
pub mod submitter;

// Re-export main types
pub use adapters::MockChain;
pub use error::{ChainError, ChainResult};
pub use ports::{ChainService, EVENT_CHANNEL_CAPACITY};
pub use submitter::{RetryPolicy, RetryingSubmitter};
