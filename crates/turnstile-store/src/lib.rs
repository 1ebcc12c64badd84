//! # turnstile-store
//!
//! Channel records: the append-only signed-state history of each channel,
//! the support calculus over it, and the funding amounts observed per asset.
//!
//! ## Ownership
//!
//! A record is exclusively owned by the scheduler task serializing its
//! channel; nothing here is internally locked. All mutation flows through
//! [`ChannelRecord::add_state`] and friends, which validate before touching
//! the history, so a rejected input always leaves the record unchanged.

pub mod error;
pub mod record;
pub mod support;

// Re-export main types
pub use error::{StoreError, StoreResult};
pub use record::{ChannelRecord, StateUpdate};
pub use support::{is_supported, supported_turn, StoredState};
