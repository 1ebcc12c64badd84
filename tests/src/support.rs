//! Test harness: linked wallets over a lossy in-process transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;
use turnstile_chain::{MockChain, RetryPolicy, RetryingSubmitter};
use turnstile_crypto::{ChannelKeyPair, StateSigner};
use turnstile_engine::{
    CreateChannelParams, EngineConfig, MessageService, Scheduler, SyncOptions,
};
use turnstile_protocols::AlwaysValid;
use turnstile_types::{
    Allocation, Destination, FundingStrategy, Notice, Outcome, Participant, U256, ADDRESS_ZERO,
};

/// Transport behavior, as in a flaky network.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyOptions {
    /// Probability a notice is silently dropped.
    pub drop_rate: f64,
    /// Mean artificial delivery delay.
    pub mean_delay: Option<Duration>,
}

type TestScheduler = Scheduler<RetryingSubmitter<MockChain>>;

/// In-process message service linking every wallet in a test.
#[derive(Default)]
pub struct TestMessageService {
    peers: Mutex<Vec<(String, Arc<TestScheduler>)>>,
    options: Mutex<LatencyOptions>,
}

impl TestMessageService {
    pub fn link(&self, participant_id: &str, scheduler: Arc<TestScheduler>) {
        self.peers
            .lock()
            .push((participant_id.to_string(), scheduler));
    }

    pub fn set_latency_options(&self, options: LatencyOptions) {
        *self.options.lock() = options;
    }
}

#[async_trait]
impl MessageService for TestMessageService {
    async fn send(&self, notice: Notice) {
        let options = *self.options.lock();
        if options.drop_rate > 0.0 && rand::thread_rng().gen::<f64>() < options.drop_rate {
            debug!(recipient = %notice.recipient, "notice dropped by test transport");
            return;
        }
        let target = self
            .peers
            .lock()
            .iter()
            .find(|(id, _)| *id == notice.recipient)
            .map(|(_, scheduler)| scheduler.clone());
        let Some(target) = target else {
            return;
        };

        let delay = options.mean_delay.map(|mean| {
            // Uniform around the mean keeps tests bounded.
            mean.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
        });
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            target.push_message(notice.message).await;
        });
    }
}

/// One wallet: a scheduler, its key, and its routing identity.
pub struct TestWallet {
    pub scheduler: Arc<TestScheduler>,
    pub key: Arc<ChannelKeyPair>,
    pub participant: Participant,
}

/// Two wallets linked over one transport and one mock chain.
pub struct TestNetwork {
    pub chain: Arc<MockChain>,
    pub transport: Arc<TestMessageService>,
    pub wallets: Vec<TestWallet>,
}

/// Install a subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl TestNetwork {
    /// Spin up linked wallets named `a`, `b`, ... over a fresh chain.
    pub fn start(count: usize) -> Self {
        init_tracing();
        let chain = Arc::new(MockChain::new());
        let transport = Arc::new(TestMessageService::default());

        let wallets: Vec<TestWallet> = (0..count)
            .map(|i| {
                let participant_id = char::from(b'a' + i as u8).to_string();
                let key = Arc::new(ChannelKeyPair::generate());
                let submitter = Arc::new(RetryingSubmitter::new(
                    chain.clone(),
                    RetryPolicy {
                        max_attempts: 3,
                        base_delay: Duration::from_millis(5),
                    },
                ));
                let config = EngineConfig {
                    participant_id: participant_id.clone(),
                    chain_id: 1234,
                    sync: SyncOptions {
                        poll_interval: Duration::from_millis(20),
                        stale_threshold: Duration::from_secs(5),
                    },
                };
                let scheduler = Scheduler::start(
                    config,
                    key.clone(),
                    Arc::new(AlwaysValid),
                    submitter,
                    transport.clone(),
                );
                transport.link(&participant_id, scheduler.clone());
                let participant = Participant {
                    signing_address: key.address(),
                    participant_id,
                    destination: Destination::from_address(key.address()),
                };
                TestWallet {
                    scheduler,
                    key,
                    participant,
                }
            })
            .collect();

        Self {
            chain,
            transport,
            wallets,
        }
    }

    /// Opening parameters between all wallets, allocation `i` funding
    /// participant `i`.
    pub fn create_params(&self, amounts: &[u64], strategy: FundingStrategy) -> CreateChannelParams {
        let indices: Vec<usize> = (0..self.wallets.len()).collect();
        self.create_params_for(&indices, amounts, strategy)
    }

    /// Opening parameters between a subset of the wallets.
    pub fn create_params_for(
        &self,
        indices: &[usize],
        amounts: &[u64],
        strategy: FundingStrategy,
    ) -> CreateChannelParams {
        let participants: Vec<Participant> = indices
            .iter()
            .map(|i| self.wallets[*i].participant.clone())
            .collect();
        CreateChannelParams {
            outcome: allocation(&participants, amounts),
            participants,
            app_data: Vec::new(),
            app_definition: [9u8; 20],
            funding_strategy: strategy,
            challenge_duration: 1000,
            channel_nonce: None,
        }
    }
}

/// Allocation pairing participants with amounts, in order.
pub fn allocation(participants: &[Participant], amounts: &[u64]) -> Outcome {
    Outcome::simple(
        ADDRESS_ZERO,
        participants
            .iter()
            .zip(amounts.iter())
            .map(|(p, amount)| Allocation {
                destination: p.destination,
                amount: U256::from(*amount),
            })
            .collect(),
    )
}

/// Await a condition, re-checking every few milliseconds.
pub async fn wait_until<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Async variant of [`wait_until`].
pub async fn wait_until_async<F, Fut>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}
