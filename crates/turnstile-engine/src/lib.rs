//! # turnstile-engine
//!
//! The wallet engine: an objective scheduler over pure protocol cranks.
//!
//! ## Architecture
//!
//! External input (API call, wire message, chain event) funnels through the
//! [`Scheduler`], which serializes work per channel and hands it to the
//! synchronous [`Engine`] core. The core looks up the affected channel
//! record, cranks the relevant protocols, applies the resulting actions
//! (sign-and-store, submit-transaction, record-funding), and returns
//! `{channel_result, outbox, chain_requests}`. Outbound notices pass through
//! the [`messaging`] reconciler before leaving the process.
//!
//! ```text
//! API / wire / chain ──→ Scheduler ──→ Engine ──→ crank(protocol state)
//!                            │            │             │
//!                       per-channel   records +     Action (0..1)
//!                         queues      objectives        │
//!                            └──── outbox / chain requests ←──┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod objectives;
pub mod result;
pub mod scheduler;

// Re-export main types
pub use config::{EngineConfig, SyncOptions};
pub use engine::{CreateChannelParams, Engine};
pub use error::{EngineError, EngineResult};
pub use messaging::merge_outgoing;
pub use objectives::{ObjectiveRecord, ObjectiveStore};
pub use result::{ChannelResult, EngineResponse, ObjectiveStatus};
pub use scheduler::{MessageService, Scheduler};
