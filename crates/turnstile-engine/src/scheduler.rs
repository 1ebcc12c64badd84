//! # Objective Scheduler
//!
//! The async shell around the engine core. All input (API calls, wire
//! messages, chain events, clock ticks) funnels through here; each channel
//! gets a bounded FIFO queue and a worker task, so one channel's inputs are
//! processed strictly in arrival order while distinct channels progress
//! independently. Cancellation is closing a queue, not unsubscribing from a
//! bus.
//!
//! The scheduler owns delivery: outbound notices go to the message service,
//! chain requests go to the chain service (with the submission result fed
//! back in as another input), and a poll loop drives the dispute clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use turnstile_chain::ChainService;
use turnstile_crypto::StateSigner;
use turnstile_protocols::AppTransitionValidator;
use turnstile_types::{
    ChainEvent, ChainTransaction, ChannelId, Message, Notice, Objective, Outcome,
};

use crate::config::EngineConfig;
use crate::engine::{CreateChannelParams, Engine};
use crate::error::EngineResult;
use crate::result::{ChannelResult, EngineResponse};

/// Inputs buffered per channel before backpressure.
const CHANNEL_QUEUE_CAPACITY: usize = 64;

/// Delivers merged notices to peers. The transport itself is external; test
/// environments link two schedulers with an in-process implementation.
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Deliver one notice. Loss is the transport's business; the engine
    /// heals via `sync_channel`.
    async fn send(&self, notice: Notice);
}

/// One unit of work on a channel's queue.
#[derive(Debug)]
enum ChannelInput {
    Wire(Message),
    Chain(ChainEvent),
    SubmissionResult(ChainTransaction, bool),
}

/// The scheduler: engine core + per-channel serialization + delivery.
pub struct Scheduler<C: ChainService + 'static> {
    engine: Arc<tokio::sync::Mutex<Engine>>,
    chain: Arc<C>,
    transport: Arc<dyn MessageService>,
    config: EngineConfig,
    queues: Mutex<HashMap<ChannelId, mpsc::Sender<ChannelInput>>>,
    last_chain_contact: Mutex<Instant>,
    chain_view_unreliable: AtomicBool,
    /// Back-reference for the tasks this scheduler spawns.
    self_ref: Weak<Self>,
}

impl<C: ChainService + 'static> Scheduler<C> {
    /// Build a scheduler and start its dispute-clock poll loop.
    pub fn start(
        config: EngineConfig,
        signer: Arc<dyn StateSigner>,
        validator: Arc<dyn AppTransitionValidator>,
        chain: Arc<C>,
        transport: Arc<dyn MessageService>,
    ) -> Arc<Self> {
        let engine = Engine::new(config.clone(), signer, validator);
        let scheduler = Arc::new_cyclic(|self_ref| Self {
            engine: Arc::new(tokio::sync::Mutex::new(engine)),
            chain,
            transport,
            config,
            queues: Mutex::new(HashMap::new()),
            last_chain_contact: Mutex::new(Instant::now()),
            chain_view_unreliable: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        });
        scheduler.clone().spawn_poll_loop();
        scheduler
    }

    fn arc(&self) -> Arc<Self> {
        self.self_ref.upgrade().expect("scheduler dropped while in use")
    }

    /// True when the chain has been unreachable past the stale threshold.
    /// A stale view means "challenge status unknown", never "no challenge".
    pub fn chain_view_unreliable(&self) -> bool {
        self.chain_view_unreliable.load(Ordering::Relaxed)
    }

    // =========================================================================
    // API
    // =========================================================================

    /// Create a channel and propose it to peers.
    pub async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> EngineResult<EngineResponse> {
        let response = self.engine.lock().await.create_channel(params)?;
        if let Some(result) = &response.channel_result {
            self.ensure_channel_worker(result.channel_id);
        }
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Approve a proposed channel.
    pub async fn join_channel(&self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let response = self.engine.lock().await.join_channel(channel_id)?;
        self.ensure_channel_worker(channel_id);
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Sign the next running state.
    pub async fn update_channel(
        &self,
        channel_id: ChannelId,
        outcome: Outcome,
        app_data: Vec<u8>,
    ) -> EngineResult<EngineResponse> {
        let response = self
            .engine
            .lock()
            .await
            .update_channel(channel_id, outcome, app_data)?;
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Close a channel.
    pub async fn close_channel(&self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let response = self.engine.lock().await.close_channel(channel_id)?;
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Challenge with our latest supported state.
    pub async fn challenge(&self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let response = self.engine.lock().await.challenge(channel_id)?;
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Re-send everything we hold for a channel.
    pub async fn sync_channel(&self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let response = self.engine.lock().await.sync_channel(channel_id)?;
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Ingest a wire message, split per channel and enqueued in arrival
    /// order on each channel's FIFO.
    pub async fn push_message(&self, message: Message) {
        for (channel_id, slice) in split_per_channel(message) {
            self.ensure_channel_worker(channel_id);
            self.enqueue(channel_id, ChannelInput::Wire(slice)).await;
        }
    }

    /// Snapshot one channel.
    pub async fn get_state(&self, channel_id: ChannelId) -> EngineResult<ChannelResult> {
        self.engine.lock().await.get_state(channel_id)
    }

    /// Snapshot every channel.
    pub async fn get_channels(&self) -> Vec<ChannelResult> {
        self.engine.lock().await.get_channels()
    }

    /// Approve any objective by id.
    pub async fn approve_objective(&self, objective_id: &str) -> EngineResult<EngineResponse> {
        let response = self.engine.lock().await.approve_objective(objective_id)?;
        self.dispatch(&response).await;
        Ok(response)
    }

    /// Register a locally originated objective (e.g. ledger or virtual
    /// funding) and crank it.
    pub async fn register_objective(&self, objective: Objective) -> EngineResult<EngineResponse> {
        for channel_id in objective.channels() {
            self.ensure_channel_worker(channel_id);
        }
        let response = {
            let mut engine = self.engine.lock().await;
            engine.register_local_objective(objective)?
        };
        self.dispatch(&response).await;
        Ok(response)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Get or create the queue + worker + chain watcher for a channel.
    fn ensure_channel_worker(&self, channel_id: ChannelId) {
        let mut queues = self.queues.lock();
        if queues.contains_key(&channel_id) {
            return;
        }
        let (sender, receiver) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
        queues.insert(channel_id, sender.clone());
        drop(queues);

        // Worker: strictly in-order processing of this channel's inputs.
        let scheduler = self.arc();
        tokio::spawn(async move {
            scheduler.channel_worker(channel_id, receiver).await;
        });

        // Watcher: forward this channel's chain events into the queue.
        let mut events = self.chain.watch(channel_id);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if sender.send(ChannelInput::Chain(event)).await.is_err() {
                    break;
                }
            }
        });
    }

    async fn channel_worker(
        self: Arc<Self>,
        channel_id: ChannelId,
        mut receiver: mpsc::Receiver<ChannelInput>,
    ) {
        while let Some(input) = receiver.recv().await {
            let result = {
                let mut engine = self.engine.lock().await;
                match input {
                    ChannelInput::Wire(message) => engine.push_message(message),
                    ChannelInput::Chain(event) => engine.handle_chain_event(event),
                    ChannelInput::SubmissionResult(tx, accepted) => {
                        engine.handle_submission_result(&tx, accepted)
                    }
                }
            };
            match result {
                Ok(response) => self.dispatch(&response).await,
                Err(err) => warn!(channel = %hex_prefix(&channel_id), error = %err, "input rejected"),
            }
        }
        debug!(channel = %hex_prefix(&channel_id), "channel queue closed");
    }

    async fn enqueue(&self, channel_id: ChannelId, input: ChannelInput) {
        let sender = self.queues.lock().get(&channel_id).cloned();
        if let Some(sender) = sender {
            if sender.send(input).await.is_err() {
                warn!("channel worker gone; input dropped");
            }
        }
    }

    /// Deliver a response's notices and submit its chain requests.
    async fn dispatch(&self, response: &EngineResponse) {
        for notice in &response.outbox {
            self.transport.send(notice.clone()).await;
        }
        for tx in &response.chain_requests {
            let scheduler = self.arc();
            let tx = tx.clone();
            tokio::spawn(async move {
                let channel_id = tx.channel_id();
                let accepted = match scheduler.chain.submit(tx.clone()).await {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(kind = tx.kind(), error = %err, "chain submission failed");
                        false
                    }
                };
                scheduler
                    .enqueue(channel_id, ChannelInput::SubmissionResult(tx, accepted))
                    .await;
            });
        }
    }

    fn spawn_poll_loop(self: Arc<Self>) {
        let poll_interval = self.config.sync.poll_interval;
        let stale_threshold = self.config.sync.stale_threshold;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.chain.block_time().await {
                    Ok(now) => {
                        *self.last_chain_contact.lock() = Instant::now();
                        self.chain_view_unreliable.store(false, Ordering::Relaxed);
                        let response = self.engine.lock().await.poll(now);
                        match response {
                            Ok(response) => self.dispatch(&response).await,
                            Err(err) => warn!(error = %err, "poll failed"),
                        }
                    }
                    Err(err) => {
                        let stale = self.last_chain_contact.lock().elapsed() > stale_threshold;
                        if stale && !self.chain_view_unreliable.swap(true, Ordering::Relaxed) {
                            warn!(error = %err, "chain view stale; challenge status unknown");
                        }
                    }
                }
            }
        });
    }
}

/// Split a wire message into per-channel slices, preserving order.
fn split_per_channel(message: Message) -> Vec<(ChannelId, Message)> {
    let mut slices: Vec<(ChannelId, Message)> = Vec::new();
    let slice_for = |channel_id: ChannelId, slices: &mut Vec<(ChannelId, Message)>| {
        if let Some(index) = slices.iter().position(|(id, _)| *id == channel_id) {
            index
        } else {
            slices.push((channel_id, Message::new()));
            slices.len() - 1
        }
    };

    for objective in message.objectives {
        let index = slice_for(objective.target_channel(), &mut slices);
        slices[index].1.objectives.push(objective);
    }
    for signed in message.signed_states {
        let index = slice_for(signed.channel_id(), &mut slices);
        slices[index].1.signed_states.push(signed);
    }
    for (_, slice) in &mut slices {
        slice.wallet_version = message.wallet_version.clone();
    }
    slices
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;
    use std::time::Duration;
    use turnstile_chain::{ChainError, ChainResult, MockChain};
    use turnstile_crypto::ChannelKeyPair;
    use turnstile_protocols::AlwaysValid;
    use turnstile_types::{
        Allocation, Destination, FundingStrategy, Participant, TxHandle, U256, ADDRESS_ZERO,
    };

    /// Transport that stores every notice.
    #[derive(Default)]
    struct RecordingTransport {
        notices: PlMutex<Vec<Notice>>,
    }

    #[async_trait]
    impl MessageService for RecordingTransport {
        async fn send(&self, notice: Notice) {
            self.notices.lock().push(notice);
        }
    }

    /// A chain whose clock is unreachable.
    struct DeadChain;

    #[async_trait]
    impl ChainService for DeadChain {
        async fn submit(&self, _tx: ChainTransaction) -> ChainResult<TxHandle> {
            Err(ChainError::Transient("down".into()))
        }
        fn watch(&self, _channel_id: ChannelId) -> mpsc::Receiver<ChainEvent> {
            mpsc::channel(1).1
        }
        async fn block_time(&self) -> ChainResult<u64> {
            Err(ChainError::Transient("down".into()))
        }
    }

    fn params(key: &ChannelKeyPair, peer: &ChannelKeyPair) -> CreateChannelParams {
        let participants = vec![
            Participant {
                signing_address: key.address(),
                participant_id: "a".into(),
                destination: Destination::from_address(key.address()),
            },
            Participant {
                signing_address: peer.address(),
                participant_id: "b".into(),
                destination: Destination::from_address(peer.address()),
            },
        ];
        let outcome = Outcome::simple(
            ADDRESS_ZERO,
            participants
                .iter()
                .map(|p| Allocation {
                    destination: p.destination,
                    amount: U256::from(3),
                })
                .collect(),
        );
        CreateChannelParams {
            participants,
            outcome,
            app_data: Vec::new(),
            app_definition: [9u8; 20],
            funding_strategy: FundingStrategy::Direct,
            challenge_duration: 1000,
            channel_nonce: None,
        }
    }

    #[tokio::test]
    async fn create_channel_delivers_proposal_and_submits_deposit() {
        let key = Arc::new(ChannelKeyPair::generate());
        let peer = ChannelKeyPair::generate();
        let chain = Arc::new(MockChain::new());
        let transport = Arc::new(RecordingTransport::default());

        let scheduler = Scheduler::start(
            EngineConfig::new("a"),
            key.clone(),
            Arc::new(AlwaysValid),
            chain.clone(),
            transport.clone(),
        );

        let response = scheduler.create_channel(params(&key, &peer)).await.unwrap();
        let channel_id = response.channel_result.unwrap().channel_id;

        // The proposal left through the transport.
        let notices = transport.notices.lock().clone();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].recipient, "b");
        assert_eq!(notices[0].message.objectives.len(), 1);
        assert_eq!(notices[0].message.signed_states.len(), 1);

        // No deposit yet: the prefund round has not completed.
        tokio::task::yield_now().await;
        assert_eq!(chain.holdings(channel_id, ADDRESS_ZERO), U256::zero());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_chain_flags_unreliable_view() {
        let key = Arc::new(ChannelKeyPair::generate());
        let transport = Arc::new(RecordingTransport::default());
        let scheduler = Scheduler::start(
            EngineConfig::new("a"),
            key,
            Arc::new(AlwaysValid),
            Arc::new(DeadChain),
            transport,
        );

        assert!(!scheduler.chain_view_unreliable());
        // Default stale threshold is 10s of silence.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(scheduler.chain_view_unreliable());
    }

    #[tokio::test]
    async fn wire_messages_split_per_channel() {
        let message = Message {
            wallet_version: "x".into(),
            objectives: Vec::new(),
            signed_states: vec![
                turnstile_types::SignedState::unsigned(turnstile_types::State {
                    turn_num: 0,
                    is_final: false,
                    channel_id: [1u8; 32],
                    app_data: Vec::new(),
                    outcome: Outcome::default(),
                }),
                turnstile_types::SignedState::unsigned(turnstile_types::State {
                    turn_num: 0,
                    is_final: false,
                    channel_id: [2u8; 32],
                    app_data: Vec::new(),
                    outcome: Outcome::default(),
                }),
            ],
        };

        let slices = split_per_channel(message);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].0, [1u8; 32]);
        assert_eq!(slices[1].0, [2u8; 32]);
        assert!(slices.iter().all(|(_, m)| m.wallet_version == "x"));
    }
}
