//! # In-Memory Mock Chain
//!
//! A complete in-process stand-in for the adjudicator: holdings ledger,
//! deposit ordering, the dispute machine as its actual adjudication logic,
//! and a controllable clock. Suitable for single-process integration tests;
//! production deployments use an RPC-backed adapter instead.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use turnstile_dispute::Adjudicator;
use turnstile_types::{
    Address, ChainEvent, ChainTransaction, ChannelId, FixedPart, TxHandle, U256,
};

use crate::error::{ChainError, ChainResult};
use crate::ports::{ChainService, EVENT_CHANNEL_CAPACITY};

struct MockChainState {
    time: u64,
    next_tx_id: u64,
    /// On-chain holdings per (channel, asset).
    holdings: HashMap<(ChannelId, Address), U256>,
    /// External balances credited by payouts.
    balances: HashMap<(Address, Address), U256>,
    /// Adjudicator storage per channel.
    adjudicators: HashMap<ChannelId, Adjudicator>,
    /// Channels whose finalization has already been announced.
    finalized_announced: Vec<ChannelId>,
    /// Event subscribers per channel.
    subscribers: HashMap<ChannelId, Vec<mpsc::Sender<ChainEvent>>>,
    /// Transient failures to inject before submissions succeed again.
    induced_failures: u32,
}

/// The mock chain adapter.
pub struct MockChain {
    state: Mutex<MockChainState>,
}

impl MockChain {
    /// A fresh chain at time zero.
    pub fn new() -> Self {
        Self::at_time(1_000_000)
    }

    /// A fresh chain at a given unix time.
    pub fn at_time(time: u64) -> Self {
        Self {
            state: Mutex::new(MockChainState {
                time,
                next_tx_id: 1,
                holdings: HashMap::new(),
                balances: HashMap::new(),
                adjudicators: HashMap::new(),
                finalized_announced: Vec::new(),
                subscribers: HashMap::new(),
                induced_failures: 0,
            }),
        }
    }

    /// Advance the clock, announcing any challenge that matured.
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock();
        state.time += seconds;
        let now = state.time;

        let matured: Vec<ChannelId> = state
            .adjudicators
            .iter()
            .filter(|(id, adj)| {
                adj.is_finalized(now) && !state.finalized_announced.contains(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        for channel_id in matured {
            state.finalized_announced.push(channel_id);
            publish(&mut state, ChainEvent::ChannelFinalized { channel_id });
        }
    }

    /// Inject `count` transient submission failures.
    pub fn fail_next_submissions(&self, count: u32) {
        self.state.lock().induced_failures = count;
    }

    /// Current holdings for a channel and asset.
    pub fn holdings(&self, channel_id: ChannelId, asset: Address) -> U256 {
        self.state
            .lock()
            .holdings
            .get(&(channel_id, asset))
            .copied()
            .unwrap_or_default()
    }

    /// External balance credited to an address for an asset.
    pub fn balance_of(&self, address: Address, asset: Address) -> U256 {
        self.state
            .lock()
            .balances
            .get(&(address, asset))
            .copied()
            .unwrap_or_default()
    }

    /// The storage hash the chain holds for a channel, if any transition
    /// ever touched it.
    pub fn storage_hash(&self, channel_id: ChannelId) -> Option<turnstile_types::Hash> {
        self.state
            .lock()
            .adjudicators
            .get(&channel_id)
            .map(|adj| adj.storage_hash())
    }

    fn execute(&self, tx: ChainTransaction) -> ChainResult<TxHandle> {
        let mut state = self.state.lock();
        if state.induced_failures > 0 {
            state.induced_failures -= 1;
            return Err(ChainError::Transient("induced submission failure".into()));
        }
        let tx_id = state.next_tx_id;
        state.next_tx_id += 1;
        let now = state.time;

        match tx {
            ChainTransaction::Deposit {
                channel_id,
                asset,
                amount,
                expected_held,
            } => {
                let held = state
                    .holdings
                    .get(&(channel_id, asset))
                    .copied()
                    .unwrap_or_default();
                if held != expected_held {
                    return Err(ChainError::Revert {
                        reason: "held != expectedHeld".into(),
                    });
                }
                let new_holding = held.saturating_add(amount);
                state.holdings.insert((channel_id, asset), new_holding);
                publish(
                    &mut state,
                    ChainEvent::Deposited {
                        channel_id,
                        asset,
                        amount,
                    },
                );
                publish(
                    &mut state,
                    ChainEvent::AllocationUpdated {
                        channel_id,
                        asset,
                        new_holding,
                    },
                );
            }
            ChainTransaction::Challenge {
                fixed,
                support,
                challenger,
            } => {
                let adjudicator = adjudicator_entry(&mut state, &fixed);
                let record = *adjudicator
                    .challenge(&support, challenger, now)
                    .map_err(revert)?;
                let channel_id = adjudicator.channel_id();
                publish(
                    &mut state,
                    ChainEvent::ChallengeRegistered {
                        channel_id,
                        turn_num_record: record.turn_num_record,
                        finalizes_at: record.finalizes_at,
                        challenger: record.challenger,
                        state_hash: record.state_hash,
                        outcome_hash: record.outcome_hash,
                    },
                );
            }
            ChainTransaction::Respond { fixed, response } => {
                adjudicator_entry(&mut state, &fixed)
                    .respond(&response, now)
                    .map_err(revert)?;
            }
            ChainTransaction::Refute {
                fixed,
                declared_turn_num_record,
                refutation,
            } => {
                adjudicator_entry(&mut state, &fixed)
                    .refute(declared_turn_num_record, &refutation, now)
                    .map_err(revert)?;
            }
            ChainTransaction::Checkpoint { fixed, support } => {
                adjudicator_entry(&mut state, &fixed)
                    .checkpoint(&support, now)
                    .map_err(revert)?;
            }
            ChainTransaction::Conclude { fixed, finale } => {
                let adjudicator = adjudicator_entry(&mut state, &fixed);
                adjudicator.conclude(&finale, now).map_err(revert)?;
                let channel_id = adjudicator.channel_id();
                state.finalized_announced.push(channel_id);
                publish(&mut state, ChainEvent::ChannelFinalized { channel_id });
            }
            ChainTransaction::TransferAllAssets { channel_id }
            | ChainTransaction::Claim { channel_id } => {
                pay_out(&mut state, channel_id)?;
            }
        }
        Ok(TxHandle { tx_id })
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainService for MockChain {
    async fn submit(&self, tx: ChainTransaction) -> ChainResult<TxHandle> {
        debug!(kind = tx.kind(), "mock chain submission");
        self.execute(tx)
    }

    fn watch(&self, channel_id: ChannelId) -> mpsc::Receiver<ChainEvent> {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.state
            .lock()
            .subscribers
            .entry(channel_id)
            .or_default()
            .push(sender);
        receiver
    }

    async fn block_time(&self) -> ChainResult<u64> {
        let mut state = self.state.lock();
        if state.induced_failures > 0 {
            state.induced_failures -= 1;
            return Err(ChainError::Transient("induced clock failure".into()));
        }
        Ok(state.time)
    }
}

fn adjudicator_entry<'a>(
    state: &'a mut MockChainState,
    fixed: &FixedPart,
) -> &'a mut Adjudicator {
    let channel_id = turnstile_crypto::channel_id(fixed);
    state
        .adjudicators
        .entry(channel_id)
        .or_insert_with(|| Adjudicator::new(fixed.clone()))
}

fn revert(err: turnstile_dispute::DisputeError) -> ChainError {
    ChainError::Revert {
        reason: err.to_string(),
    }
}

/// Release a finalized channel's holdings per its payout outcome, in
/// allocation priority order.
fn pay_out(state: &mut MockChainState, channel_id: ChannelId) -> ChainResult<()> {
    let now = state.time;
    let outcome = state
        .adjudicators
        .get(&channel_id)
        .and_then(|adj| adj.payout_outcome(now).cloned())
        .ok_or_else(|| ChainError::Revert {
            reason: "Channel not finalized".into(),
        })?;

    let mut events = Vec::new();
    for asset_allocation in outcome.assets() {
        let asset = asset_allocation.asset;
        let mut held = state
            .holdings
            .get(&(channel_id, asset))
            .copied()
            .unwrap_or_default();

        for allocation in &asset_allocation.allocations {
            let pay = held.min(allocation.amount);
            if pay.is_zero() {
                continue;
            }
            held -= pay;
            if let Some(address) = allocation.destination.as_address() {
                let balance = state.balances.entry((address, asset)).or_default();
                *balance = balance.saturating_add(pay);
            } else {
                // Funds backing another channel move into its holdings.
                let dest_channel = allocation.destination.as_channel_id();
                let holding = state.holdings.entry((dest_channel, asset)).or_default();
                *holding = holding.saturating_add(pay);
                let new_holding = *holding;
                events.push(ChainEvent::AllocationUpdated {
                    channel_id: dest_channel,
                    asset,
                    new_holding,
                });
            }
        }

        state.holdings.insert((channel_id, asset), held);
        events.push(ChainEvent::AllocationUpdated {
            channel_id,
            asset,
            new_holding: held,
        });
    }

    for event in events {
        publish(state, event);
    }
    Ok(())
}

fn publish(state: &mut MockChainState, event: ChainEvent) {
    let channel_id = event.channel_id();
    let Some(subscribers) = state.subscribers.get_mut(&channel_id) else {
        return;
    };
    subscribers.retain(|sender| match sender.try_send(event.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("chain event dropped (subscriber queue full)");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}
