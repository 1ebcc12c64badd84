//! # Chain Service Port
//!
//! The boundary to the on-chain adjudicator. Everything behind it is an
//! adapter: an RPC-backed implementation in production, the in-memory mock
//! in tests. Event feeds are bounded queues per subscriber; cancelling a
//! subscription is dropping the receiver.

use async_trait::async_trait;
use tokio::sync::mpsc;
use turnstile_types::{ChainEvent, ChainTransaction, ChannelId, TxHandle};

use crate::error::ChainResult;

/// Events buffered per subscriber before backpressure drops.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Submits transactions and watches adjudicator events.
#[async_trait]
pub trait ChainService: Send + Sync {
    /// Submit a transaction. Resolves once accepted (mined) or failed.
    async fn submit(&self, tx: ChainTransaction) -> ChainResult<TxHandle>;

    /// Subscribe to one channel's events. Events observed after this call
    /// are delivered in order; the queue is bounded, and a full or dropped
    /// receiver loses events rather than blocking the chain watcher.
    fn watch(&self, channel_id: ChannelId) -> mpsc::Receiver<ChainEvent>;

    /// Current chain time (unix seconds), used for dispute-clock checks.
    /// Fails when the chain is unreachable; callers track staleness rather
    /// than assuming a quiet chain means no challenge.
    async fn block_time(&self) -> ChainResult<u64>;
}
