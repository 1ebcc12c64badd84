//! # Retrying Submitter
//!
//! Wraps a chain service with bounded-attempt exponential backoff. Transient
//! failures (nonce conflicts, RPC timeouts) are retried; reverts are not,
//! since resubmitting a rejected transaction cannot succeed. Exhausted
//! retries surface as a recoverable failure to the objective that asked.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;
use turnstile_types::{ChainEvent, ChainTransaction, ChannelId, TxHandle};

use crate::error::{ChainError, ChainResult};
use crate::ports::ChainService;

/// Retry policy for transaction submission.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// A chain service with submission retries.
pub struct RetryingSubmitter<C> {
    inner: Arc<C>,
    policy: RetryPolicy,
}

impl<C: ChainService> RetryingSubmitter<C> {
    /// Wrap a chain service with the given policy.
    pub fn new(inner: Arc<C>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped service.
    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }
}

#[async_trait]
impl<C: ChainService> ChainService for RetryingSubmitter<C> {
    async fn submit(&self, tx: ChainTransaction) -> ChainResult<TxHandle> {
        let mut delay = self.policy.base_delay;
        let mut last_reason = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match self.inner.submit(tx.clone()).await {
                Ok(handle) => return Ok(handle),
                Err(err) if err.is_transient() => {
                    warn!(
                        kind = tx.kind(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "transient submission failure, backing off"
                    );
                    last_reason = err.to_string();
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Err(ChainError::SubmissionFailed {
            attempts: self.policy.max_attempts,
            reason: last_reason,
        })
    }

    fn watch(&self, channel_id: ChannelId) -> mpsc::Receiver<ChainEvent> {
        self.inner.watch(channel_id)
    }

    async fn block_time(&self) -> ChainResult<u64> {
        self.inner.block_time().await
    }
}
