//! In-crate test support: a multi-party channel with one record per
//! participant and a lossless relay between them.

#![allow(clippy::unwrap_used)]

use turnstile_crypto::{state_hash, ChannelKeyPair, StateSigner};
use turnstile_store::ChannelRecord;
use turnstile_types::{
    Allocation, Destination, FixedPart, FundingStrategy, Outcome, SignedState, State, U256,
    ADDRESS_ZERO,
};

use crate::actions::Action;
use crate::apply::apply_sign_action;
use crate::state::OpenState;

/// A channel simulated across every participant's record.
pub struct TestChannel {
    pub keys: Vec<ChannelKeyPair>,
    pub fixed: FixedPart,
    pub records: Vec<ChannelRecord>,
    pub amounts: Vec<u64>,
}

impl TestChannel {
    pub fn new(amounts: &[u64]) -> Self {
        let keys: Vec<ChannelKeyPair> =
            (0..amounts.len()).map(|_| ChannelKeyPair::generate()).collect();
        let fixed = FixedPart {
            chain_id: 1234,
            participants: keys.iter().map(|k| k.address()).collect(),
            channel_nonce: 1,
            app_definition: [9u8; 20],
            challenge_duration: 1000,
        };
        let records = (0..amounts.len())
            .map(|i| ChannelRecord::new(fixed.clone(), i))
            .collect();
        Self {
            keys,
            fixed,
            records,
            amounts: amounts.to_vec(),
        }
    }

    pub fn two_party(amounts: &[u64]) -> Self {
        assert_eq!(amounts.len(), 2);
        Self::new(amounts)
    }

    /// A second channel between the same participants, under a new nonce.
    pub fn with_participants(other: &TestChannel, amounts: &[u64], channel_nonce: u64) -> Self {
        let indices: Vec<usize> = (0..other.keys.len()).collect();
        Self::subset(other, &indices, amounts, channel_nonce)
    }

    /// A channel between a subset of another channel's participants.
    pub fn subset(
        other: &TestChannel,
        indices: &[usize],
        amounts: &[u64],
        channel_nonce: u64,
    ) -> Self {
        assert_eq!(amounts.len(), indices.len());
        let keys: Vec<ChannelKeyPair> = indices
            .iter()
            .map(|i| ChannelKeyPair::from_bytes(other.keys[*i].to_bytes()).unwrap())
            .collect();
        let fixed = FixedPart {
            participants: keys.iter().map(|k| k.address()).collect(),
            channel_nonce,
            ..other.fixed.clone()
        };
        let records = (0..amounts.len())
            .map(|i| ChannelRecord::new(fixed.clone(), i))
            .collect();
        Self {
            keys,
            fixed,
            records,
            amounts: amounts.to_vec(),
        }
    }

    /// The opening outcome: allocation `i` pays participant `i`.
    pub fn opening_outcome(&self) -> Outcome {
        Outcome::simple(
            ADDRESS_ZERO,
            self.amounts
                .iter()
                .zip(self.fixed.participants.iter())
                .map(|(amount, p)| Allocation {
                    destination: Destination::from_address(*p),
                    amount: U256::from(*amount),
                })
                .collect(),
        )
    }

    /// The creator signs turn 0, as the engine does on `create_channel`.
    pub fn create_opening_state(&mut self, creator: usize) {
        let state = State {
            turn_num: 0,
            is_final: false,
            channel_id: self.records[creator].channel_id(),
            app_data: Vec::new(),
            outcome: self.opening_outcome(),
        };
        let hash = state_hash(&self.fixed, &state);
        let signed = SignedState::new(state, self.keys[creator].sign(&hash));
        self.records[creator].add_state(signed).unwrap();
    }

    /// Deliver every participant's states to everyone else. Duplicate and
    /// stale deliveries are dropped, as the store would on the wire.
    pub fn relay_all(&mut self) {
        let all: Vec<Vec<SignedState>> = self
            .records
            .iter()
            .map(|r| r.signed_states().cloned().collect())
            .collect();
        for (from, states) in all.iter().enumerate() {
            for (to, record) in self.records.iter_mut().enumerate() {
                if from == to {
                    continue;
                }
                for signed in states {
                    let _ = record.add_state(signed.clone());
                }
            }
        }
    }

    /// Record an on-chain holding for the native asset on every view.
    pub fn set_holdings(&mut self, amount: U256) {
        for record in &mut self.records {
            record.set_holding(ADDRESS_ZERO, amount);
        }
    }
}

/// Apply a crank's sign action on behalf of participant `who`.
pub fn apply_sign(channel: &mut TestChannel, who: usize, action: &Action) -> Option<SignedState> {
    match action {
        Action::SignState { sign, .. } => Some(
            apply_sign_action(&mut channel.records[who], sign, &channel.keys[who]).unwrap(),
        ),
        _ => None,
    }
}

/// An approved open view over a record.
pub fn open_view<'a>(
    record: &'a ChannelRecord,
    strategy: FundingStrategy,
    deposit_in_flight: bool,
) -> OpenState<'a> {
    OpenState {
        approved: true,
        strategy,
        deposit_in_flight,
        app: record,
    }
}

/// The total on-chain funding target for an allocation set.
pub fn funded_targets(amounts: &[u64]) -> U256 {
    amounts.iter().fold(U256::zero(), |acc, a| acc + U256::from(*a))
}

/// Drive a fresh channel through both setup rounds (fake funding) so tests
/// can start from a running channel.
pub fn running_channel(amounts: &[u64]) -> TestChannel {
    let mut channel = TestChannel::new(amounts);
    channel.create_opening_state(0);
    channel.relay_all();

    for _ in 0..2 * amounts.len() {
        for i in 0..amounts.len() {
            let action = crate::open_channel::crank_open(&open_view(
                &channel.records[i],
                FundingStrategy::Fake,
                false,
            ));
            if matches!(action, Action::SignState { .. }) {
                apply_sign(&mut channel, i, &action);
                channel.relay_all();
            }
        }
    }
    for record in &channel.records {
        assert!(crate::state::postfund_complete(record), "setup did not complete");
    }
    channel
}
