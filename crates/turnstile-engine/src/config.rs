//! Engine configuration.

use std::time::Duration;

/// Dispute-clock synchronization options.
///
/// The dispute clock is driven by periodic chain polling. Beyond the stale
/// threshold without successful chain contact, the engine flags its chain
/// view as unreliable instead of assuming no challenge is running.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// How often to poll the chain clock and re-check dispute timers.
    pub poll_interval: Duration,
    /// How long without chain contact before the view is flagged stale.
    pub stale_threshold: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stale_threshold: Duration::from_secs(10),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Routing id this engine sends messages as.
    pub participant_id: String,
    /// Chain the engine funds and disputes on.
    pub chain_id: u64,
    /// Dispute-clock polling.
    pub sync: SyncOptions,
}

impl EngineConfig {
    /// A config for the given participant on chain 1.
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            chain_id: 1,
            sync: SyncOptions::default(),
        }
    }
}
