//! # Channel Records
//!
//! A [`ChannelRecord`] owns the full signed-state history for one channel,
//! the local participant's position, and the funding amounts observed per
//! asset. Mutation is append-only: states are never deleted short of full
//! channel teardown, and the supported turn never regresses except by an
//! explicit on-chain conclusion.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;
use turnstile_crypto::{recover_signer, state_hash, StateSigner};
use turnstile_types::{
    Address, ChannelId, FixedPart, Outcome, SignedState, Stage, State, U256,
};

use crate::error::{StoreError, StoreResult};
use crate::support::{supported_turn, StoredState};

/// Caller-supplied fields for the next state.
///
/// Everything not supplied is carried over from the current supported state.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// Explicit turn number; defaults to supported turn + 1.
    pub turn_num: Option<u64>,
    /// Mark the state final.
    pub is_final: bool,
    /// Replace the application data.
    pub app_data: Option<Vec<u8>>,
    /// Replace the outcome.
    pub outcome: Option<Outcome>,
}

/// The signed-state history and funding view of a single channel.
///
/// Serializable as-is: this is the persisted layout, one record per channel
/// id, with the persistence mechanism itself external.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    fixed: FixedPart,
    channel_id: ChannelId,
    my_index: usize,
    states: BTreeMap<u64, StoredState>,
    /// Highest fully-supported turn; monotone by construction.
    supported: Option<u64>,
    /// On-chain holdings observed per asset.
    funding: HashMap<Address, U256>,
    /// Set once an on-chain conclusion is observed.
    finalized_on_chain: bool,
}

impl ChannelRecord {
    /// Create an empty record for a channel we participate in.
    pub fn new(fixed: FixedPart, my_index: usize) -> Self {
        let channel_id = turnstile_crypto::channel_id(&fixed);
        debug_assert!(my_index < fixed.num_participants());
        Self {
            fixed,
            channel_id,
            my_index,
            states: BTreeMap::new(),
            supported: None,
            funding: HashMap::new(),
            finalized_on_chain: false,
        }
    }

    /// The channel's immutable part.
    pub fn fixed(&self) -> &FixedPart {
        &self.fixed
    }

    /// The channel id derived from the fixed part.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// The local participant's position in the participant list.
    pub fn my_index(&self) -> usize {
        self.my_index
    }

    /// The local participant's signing address.
    pub fn my_address(&self) -> Address {
        self.fixed.participants[self.my_index]
    }

    /// True if the local participant is the mover at `turn_num`.
    pub fn is_my_turn(&self, turn_num: u64) -> bool {
        self.fixed.mover_index(turn_num) == self.my_index
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Validate and store an incoming signed state.
    ///
    /// Signatures are recovered and checked against the participant list; the
    /// turn number must be 0, the immediate successor of the highest stored
    /// turn, or an already-stored turn (in which case the signatures are
    /// merged into the existing record).
    pub fn add_state(&mut self, signed: SignedState) -> StoreResult<()> {
        if signed.channel_id() != self.channel_id {
            return Err(StoreError::WrongChannel);
        }

        let turn_num = signed.turn_num();
        if let Some(supported) = self.supported {
            if turn_num < supported {
                return Err(StoreError::StaleState {
                    supported_turn: supported,
                    actual_turn: turn_num,
                });
            }
        }

        let signer_indices = self.recover_signer_indices(&signed)?;

        let expected = self.next_turn();
        match self.states.entry(turn_num) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if existing.signed.state != signed.state {
                    return Err(StoreError::ConflictingState { turn_num });
                }
                let absorbed = existing.signed.merge_signatures(&signed);
                existing.signer_indices.extend(signer_indices);
                if absorbed > 0 {
                    debug!(turn_num, absorbed, "merged signatures into stored state");
                }
            }
            Entry::Vacant(entry) => {
                if turn_num != expected {
                    return Err(StoreError::InvalidTransition {
                        expected_turn: expected,
                        actual_turn: turn_num,
                    });
                }
                entry.insert(StoredState {
                    signed,
                    signer_indices,
                });
            }
        }

        self.refresh_supported();
        Ok(())
    }

    /// Construct the next state from the supported one plus caller-supplied
    /// fields, sign it, store it, and return it.
    pub fn sign_and_add(
        &mut self,
        update: StateUpdate,
        signer: &dyn StateSigner,
    ) -> StoreResult<SignedState> {
        let base = self.supported_state().cloned();
        let turn_num = update.turn_num.unwrap_or_else(|| {
            base.as_ref().map(|s| s.turn_num() + 1).unwrap_or(0)
        });

        let state = State {
            turn_num,
            is_final: update.is_final,
            channel_id: self.channel_id,
            app_data: update
                .app_data
                .or_else(|| base.as_ref().map(|s| s.state.app_data.clone()))
                .unwrap_or_default(),
            outcome: update
                .outcome
                .or_else(|| base.as_ref().map(|s| s.state.outcome.clone()))
                .unwrap_or_default(),
        };

        let hash = state_hash(&self.fixed, &state);
        let signed = SignedState::new(state, signer.sign(&hash));
        self.add_state(signed.clone())?;
        Ok(signed)
    }

    /// Add our signature to the state already stored at `turn_num`.
    pub fn countersign(
        &mut self,
        turn_num: u64,
        signer: &dyn StateSigner,
    ) -> StoreResult<SignedState> {
        let stored = self
            .states
            .get(&turn_num)
            .ok_or(StoreError::MissingState { turn_num })?;

        let hash = state_hash(&self.fixed, &stored.signed.state);
        let signed = SignedState::new(stored.signed.state.clone(), signer.sign(&hash));
        self.add_state(signed.clone())?;
        Ok(signed)
    }

    /// Record the on-chain holding observed for an asset.
    pub fn set_holding(&mut self, asset: Address, amount: U256) {
        self.funding.insert(asset, amount);
    }

    /// Mark the channel concluded on-chain.
    pub fn set_finalized(&mut self) {
        self.finalized_on_chain = true;
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// The highest fully-supported state, if any.
    pub fn supported_state(&self) -> Option<&SignedState> {
        self.supported
            .and_then(|turn| self.states.get(&turn))
            .map(|stored| &stored.signed)
    }

    /// Protocol stage derived from the supported state.
    pub fn stage(&self) -> Stage {
        match self.supported_state() {
            None => Stage::Missing,
            Some(signed) => Stage::of(
                signed.turn_num(),
                signed.state.is_final,
                self.fixed.num_participants(),
            ),
        }
    }

    /// The highest state carrying our own signature, if any.
    pub fn latest_signed_by_me(&self) -> Option<&SignedState> {
        self.states
            .values()
            .rev()
            .find(|stored| stored.signer_indices.contains(&self.my_index))
            .map(|stored| &stored.signed)
    }

    /// The state stored at a turn, if any.
    pub fn state_at(&self, turn_num: u64) -> Option<&SignedState> {
        self.states.get(&turn_num).map(|stored| &stored.signed)
    }

    /// Every stored signed state, turn-ascending.
    pub fn signed_states(&self) -> impl Iterator<Item = &SignedState> {
        self.states.values().map(|stored| &stored.signed)
    }

    /// Participant indices recovered on the state at a turn.
    pub fn signers_at(&self, turn_num: u64) -> Option<&BTreeSet<usize>> {
        self.states.get(&turn_num).map(|stored| &stored.signer_indices)
    }

    /// The contiguous run of signed states proving support for the supported
    /// state, lowest turn first. Empty if nothing is supported yet.
    ///
    /// This is exactly what a challenge or checkpoint submission carries.
    pub fn support_proof(&self) -> Vec<SignedState> {
        let Some(head_turn) = self.supported else {
            return Vec::new();
        };
        let num_participants = self.fixed.num_participants();
        let head = &self.states[&head_turn];

        // Mirror the support walk: take states until coverage is complete.
        let mut covered = head.signer_indices.clone();
        let mut proof = vec![head.signed.clone()];
        let mut turn = head_turn;
        while covered.len() < num_participants {
            if turn == 0 || head_turn - (turn - 1) >= num_participants as u64 {
                break;
            }
            turn -= 1;
            let Some(stored) = self.states.get(&turn) else {
                break;
            };
            covered.insert(self.fixed.mover_index(turn));
            proof.push(stored.signed.clone());
        }
        proof.reverse();
        proof
    }

    /// The turn number a new state would need.
    pub fn next_turn(&self) -> u64 {
        self.states
            .keys()
            .next_back()
            .map(|turn| turn + 1)
            .unwrap_or(0)
    }

    /// On-chain holding observed for an asset (zero if never seen).
    pub fn holding(&self, asset: &Address) -> U256 {
        self.funding.get(asset).copied().unwrap_or_default()
    }

    /// True when every asset's observed holding covers the supported
    /// outcome's allocation total.
    pub fn is_funded(&self) -> bool {
        let Some(supported) = self.supported_state() else {
            return false;
        };
        supported
            .state
            .outcome
            .assets()
            .all(|asset| self.holding(&asset.asset) >= asset.total())
    }

    /// True once an on-chain conclusion has been observed.
    pub fn is_finalized_on_chain(&self) -> bool {
        self.finalized_on_chain
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn recover_signer_indices(&self, signed: &SignedState) -> StoreResult<BTreeSet<usize>> {
        let hash = state_hash(&self.fixed, &signed.state);
        let mut indices = BTreeSet::new();
        for signature in &signed.signatures {
            let signer = recover_signer(&hash, signature)
                .map_err(|_| StoreError::SignatureUnrecoverable)?;
            let index = self
                .fixed
                .index_of(&signer)
                .ok_or(StoreError::SignatureInvalid { signer })?;
            indices.insert(index);
        }
        Ok(indices)
    }

    fn refresh_supported(&mut self) {
        let fresh = supported_turn(&self.fixed, &self.states);
        // Monotonic: an already-established supported turn never regresses.
        match (self.supported, fresh) {
            (Some(old), Some(new)) if new > old => {
                debug!(old, new, "supported state advanced");
                self.supported = Some(new);
            }
            (None, Some(new)) => {
                debug!(new, "supported state established");
                self.supported = Some(new);
            }
            _ => {}
        }
    }
}
