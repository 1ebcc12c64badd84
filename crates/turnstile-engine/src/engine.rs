//! # Engine Core
//!
//! The synchronous heart of the wallet: owns every channel record, the
//! objective store and the local dispute mirrors, and turns external input
//! (API calls, wire messages, chain events) into signed states, outbound
//! notices and pending chain transactions.
//!
//! The engine itself never blocks and never talks to the network or the
//! chain; the scheduler owns delivery and serialization.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use turnstile_crypto::StateSigner;
use turnstile_dispute::ChallengeRecord;
use turnstile_protocols::{
    apply_sign_action, crank_close, crank_defense, crank_defund, crank_ledger, crank_open,
    crank_virtual, validate_update, Action, AppTransitionValidator, CloseState, DefenseAction,
    DefundState, LedgerState, OpenState, VirtualRole, VirtualState,
};
use turnstile_store::{ChannelRecord, StateUpdate};
use turnstile_types::{
    Address, ChainEvent, ChainTransaction, ChannelId, CloseChannel, Defund, FixedPart,
    FundingStrategy, Message, Notice, Objective, OpenChannel, Outcome,
    Participant, SignedState, Stage, WireError, WALLET_VERSION,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::messaging::merge_outgoing;
use crate::objectives::ObjectiveStore;
use crate::result::{ChannelResult, EngineResponse, ObjectiveStatus};

/// Parameters for [`Engine::create_channel`].
#[derive(Debug, Clone)]
pub struct CreateChannelParams {
    /// Every participant, creator first.
    pub participants: Vec<Participant>,
    /// Opening outcome; allocation `i` is participant `i`'s funding target.
    pub outcome: Outcome,
    /// Opening application data.
    pub app_data: Vec<u8>,
    /// Application validator contract address.
    pub app_definition: Address,
    /// How the channel gets funded.
    pub funding_strategy: FundingStrategy,
    /// Seconds a challenge stays open.
    pub challenge_duration: u64,
    /// Channel nonce; allocated internally when absent.
    pub channel_nonce: Option<u64>,
}

/// A local mirror of one channel's on-chain challenge storage.
#[derive(Debug, Clone, Default)]
struct DisputeMirror {
    record: ChallengeRecord,
    /// A defensive transaction was already produced for this challenge.
    defense_submitted: bool,
}

/// The engine core. One instance per participant process.
pub struct Engine {
    config: EngineConfig,
    signer: Arc<dyn StateSigner>,
    validator: Arc<dyn AppTransitionValidator>,
    records: HashMap<ChannelId, ChannelRecord>,
    participants: HashMap<ChannelId, Vec<Participant>>,
    objectives: ObjectiveStore,
    mirrors: HashMap<ChannelId, DisputeMirror>,
    /// Latest chain time observed through events or polling.
    chain_time: u64,
    next_nonce: u64,
}

impl Engine {
    /// Create an engine around a signing oracle and app validator.
    pub fn new(
        config: EngineConfig,
        signer: Arc<dyn StateSigner>,
        validator: Arc<dyn AppTransitionValidator>,
    ) -> Self {
        Self {
            config,
            signer,
            validator,
            records: HashMap::new(),
            participants: HashMap::new(),
            objectives: ObjectiveStore::new(),
            mirrors: HashMap::new(),
            chain_time: 0,
            next_nonce: 1,
        }
    }

    /// The engine's signing address.
    pub fn signing_address(&self) -> Address {
        self.signer.address()
    }

    /// The engine's messaging id.
    pub fn participant_id(&self) -> &str {
        &self.config.participant_id
    }

    /// Record the latest chain time seen by the scheduler.
    pub fn set_chain_time(&mut self, time: u64) {
        self.chain_time = self.chain_time.max(time);
    }

    // =========================================================================
    // API: CHANNEL LIFECYCLE
    // =========================================================================

    /// Create a channel: build the fixed part, sign the opening state, and
    /// propose an `OpenChannel` objective to every peer.
    pub fn create_channel(&mut self, params: CreateChannelParams) -> EngineResult<EngineResponse> {
        let my_address = self.signer.address();
        // Creator-first convention keeps setup turns contiguous: the
        // proposer signs turn 0, each peer signs its own turn on arrival.
        if params.participants.first().map(|p| p.signing_address) != Some(my_address) {
            return Err(EngineError::CreatorNotFirst);
        }

        let channel_nonce = params.channel_nonce.unwrap_or_else(|| {
            let nonce = self.next_nonce;
            self.next_nonce += 1;
            nonce
        });
        let fixed = FixedPart {
            chain_id: self.config.chain_id,
            participants: params.participants.iter().map(|p| p.signing_address).collect(),
            channel_nonce,
            app_definition: params.app_definition,
            challenge_duration: params.challenge_duration,
        };

        let mut record = ChannelRecord::new(fixed.clone(), 0);
        let channel_id = record.channel_id();
        let opening = record.sign_and_add(
            StateUpdate {
                turn_num: Some(0),
                is_final: false,
                app_data: Some(params.app_data),
                outcome: Some(params.outcome),
            },
            self.signer.as_ref(),
        )?;
        self.records.insert(channel_id, record);
        self.participants.insert(channel_id, params.participants.clone());

        let objective = Objective::OpenChannel(OpenChannel {
            target_channel: channel_id,
            fixed,
            participants: params.participants,
            funding_strategy: params.funding_strategy,
        });
        let objective_id = self.objectives.register(objective.clone(), true, true);
        debug!(objective_id = %objective_id, "channel created");

        let mut response = EngineResponse::default();
        self.notify_peers(channel_id, vec![objective], vec![opening], &mut response);
        self.crank_channel(channel_id, &mut response)?;
        self.finish(Some(channel_id), response)
    }

    /// Approve a proposed channel and let the open protocol take it from
    /// here.
    pub fn join_channel(&mut self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let objective_id = self
            .objectives
            .for_channel(channel_id)
            .into_iter()
            .find(|id| id.starts_with("OpenChannel-"))
            .ok_or_else(|| EngineError::ObjectiveUnsupported {
                objective_id: format!("OpenChannel for {}", hex_prefix(&channel_id)),
            })?;
        self.approve_objective(&objective_id)
    }

    /// Approve any tracked objective by id.
    pub fn approve_objective(&mut self, objective_id: &str) -> EngineResult<EngineResponse> {
        if !self.objectives.approve(objective_id) {
            return Err(EngineError::ObjectiveUnsupported {
                objective_id: objective_id.to_string(),
            });
        }
        let channels = self
            .objectives
            .get(objective_id)
            .map(|record| record.objective.channels())
            .unwrap_or_default();

        let mut response = EngineResponse::default();
        for channel_id in &channels {
            self.crank_channel(*channel_id, &mut response)?;
        }
        self.finish(channels.first().copied(), response)
    }

    /// Sign the next running state with a caller-supplied allocation and app
    /// data, and relay it to peers.
    pub fn update_channel(
        &mut self,
        channel_id: ChannelId,
        outcome: Outcome,
        app_data: Vec<u8>,
    ) -> EngineResult<EngineResponse> {
        let record = self.records.get_mut(&channel_id).ok_or(EngineError::UnknownChannel)?;
        if record.stage() != Stage::Running && record.stage() != Stage::PostfundSetup {
            return Err(EngineError::NotReady("channel is not running"));
        }
        let supported = record
            .supported_state()
            .ok_or(EngineError::NotReady("no supported state"))?
            .clone();

        let proposed = turnstile_types::State {
            turn_num: supported.turn_num() + 1,
            is_final: false,
            channel_id,
            app_data: app_data.clone(),
            outcome: outcome.clone(),
        };
        validate_update(
            record.fixed(),
            &supported.state,
            &proposed,
            record.my_index(),
            self.validator.as_ref(),
        )?;

        let signed = record.sign_and_add(
            StateUpdate {
                turn_num: None,
                is_final: false,
                app_data: Some(app_data),
                outcome: Some(outcome),
            },
            self.signer.as_ref(),
        )?;

        let mut response = EngineResponse::default();
        self.notify_peers(channel_id, Vec::new(), vec![signed], &mut response);
        self.crank_channel(channel_id, &mut response)?;
        self.finish(Some(channel_id), response)
    }

    /// Close a channel: agree a final state, conclude, defund.
    pub fn close_channel(&mut self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        if !self.records.contains_key(&channel_id) {
            return Err(EngineError::UnknownChannel);
        }
        let objective = Objective::CloseChannel(CloseChannel {
            target_channel: channel_id,
        });
        let proposal = objective.clone();
        self.objectives.register(objective, true, true);

        let mut response = EngineResponse::default();
        self.notify_peers(channel_id, vec![proposal], Vec::new(), &mut response);
        self.crank_channel(channel_id, &mut response)?;
        self.finish(Some(channel_id), response)
    }

    /// Register a locally originated objective (ledger funding, virtual
    /// funding, defund) and propose it to the peers of every channel it
    /// touches.
    pub fn register_local_objective(&mut self, objective: Objective) -> EngineResult<EngineResponse> {
        let channels = objective.channels();
        let proposal = objective.clone();
        self.objectives.register(objective, true, true);

        let mut response = EngineResponse::default();
        for channel_id in &channels {
            self.notify_peers(*channel_id, vec![proposal.clone()], Vec::new(), &mut response);
        }
        for channel_id in &channels {
            self.crank_channel(*channel_id, &mut response)?;
        }
        self.finish(channels.first().copied(), response)
    }

    /// Register a challenge asserting our latest supported state.
    ///
    /// The adjudicator's preconditions are mirrored locally first, so a
    /// submission that would revert never leaves the process.
    pub fn challenge(&mut self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let record = self.records.get(&channel_id).ok_or(EngineError::UnknownChannel)?;
        let support = record.support_proof();
        let head = support
            .last()
            .ok_or(EngineError::NotReady("no supported state to challenge with"))?;

        let mirror = self.mirrors.entry(channel_id).or_default();
        if mirror.record.is_active() && !mirror.record.is_expired(self.chain_time) {
            return Err(turnstile_dispute::DisputeError::InvalidChallenge {
                candidate_turn: head.turn_num(),
                turn_num_record: mirror.record.turn_num_record,
            }
            .into());
        }
        if mirror.record.turn_num_record >= head.turn_num() && mirror.record.turn_num_record > 0 {
            return Err(turnstile_dispute::DisputeError::InvalidChallenge {
                candidate_turn: head.turn_num(),
                turn_num_record: mirror.record.turn_num_record,
            }
            .into());
        }

        let mut response = EngineResponse::default();
        response.chain_requests.push(ChainTransaction::Challenge {
            fixed: record.fixed().clone(),
            support,
            challenger: self.signer.address(),
        });
        self.finish(Some(channel_id), response)
    }

    // =========================================================================
    // API: INPUT
    // =========================================================================

    /// Ingest a wire message from a peer.
    pub fn push_message(&mut self, message: Message) -> EngineResult<EngineResponse> {
        if message.wallet_version != WALLET_VERSION {
            return Err(WireError::UnsupportedVersion {
                received: message.wallet_version,
                supported: WALLET_VERSION.to_string(),
            }
            .into());
        }

        let mut touched: Vec<ChannelId> = Vec::new();
        for objective in message.objectives {
            if let Some(channel_id) = self.ingest_objective(objective)? {
                if !touched.contains(&channel_id) {
                    touched.push(channel_id);
                }
            }
        }
        for signed in message.signed_states {
            if let Some(channel_id) = self.ingest_signed_state(signed) {
                if !touched.contains(&channel_id) {
                    touched.push(channel_id);
                }
            }
        }

        let mut response = EngineResponse::default();
        for channel_id in &touched {
            self.crank_channel(*channel_id, &mut response)?;
        }
        self.finish(touched.first().copied(), response)
    }

    /// Ingest one adjudicator event.
    pub fn handle_chain_event(&mut self, event: ChainEvent) -> EngineResult<EngineResponse> {
        let channel_id = event.channel_id();
        let mut response = EngineResponse::default();

        match event {
            ChainEvent::Deposited { asset, amount, .. } => {
                debug!(?asset, %amount, "deposit observed");
            }
            ChainEvent::AllocationUpdated { asset, new_holding, .. } => {
                if let Some(record) = self.records.get_mut(&channel_id) {
                    record.set_holding(asset, new_holding);
                }
                // A landed deposit clears the in-flight flag so the open
                // protocol can fund the next slot if needed.
                for id in self.objectives.for_channel(channel_id) {
                    if let Some(objective) = self.objectives.get_mut(&id) {
                        objective.deposit_in_flight = false;
                    }
                }
            }
            ChainEvent::ChallengeRegistered {
                turn_num_record,
                finalizes_at,
                challenger,
                state_hash,
                outcome_hash,
                ..
            } => {
                self.mirrors.insert(
                    channel_id,
                    DisputeMirror {
                        record: ChallengeRecord {
                            turn_num_record,
                            finalizes_at,
                            state_hash,
                            challenger,
                            outcome_hash,
                        },
                        defense_submitted: false,
                    },
                );
                self.defend(channel_id, &mut response)?;
            }
            ChainEvent::ChannelFinalized { .. } => {
                if let Some(record) = self.records.get_mut(&channel_id) {
                    record.set_finalized();
                }
                // A forced finalization with no cooperative close running
                // still needs its funds released.
                let has_close = self
                    .objectives
                    .for_channel(channel_id)
                    .iter()
                    .any(|id| id.starts_with("CloseChannel-"));
                if !has_close && self.records.contains_key(&channel_id) {
                    self.objectives.register(
                        Objective::Defund(Defund {
                            target_channel: channel_id,
                        }),
                        true,
                        true,
                    );
                }
            }
        }

        self.crank_channel(channel_id, &mut response)?;
        self.finish(Some(channel_id), response)
    }

    /// Periodic dispute-clock tick with the latest chain time.
    ///
    /// Re-checks every live challenge so an unanswered one is either
    /// defended or knowingly conceded, never silently missed.
    pub fn poll(&mut self, chain_time: u64) -> EngineResult<EngineResponse> {
        self.set_chain_time(chain_time);
        let mut response = EngineResponse::default();

        let channels: Vec<ChannelId> = self.mirrors.keys().copied().collect();
        for channel_id in channels {
            self.defend(channel_id, &mut response)?;
            self.crank_channel(channel_id, &mut response)?;
        }
        self.objectives.evict_terminal();
        self.finish(None, response)
    }

    /// Report the result of an attempted chain submission back to the
    /// engine, so in-flight flags reflect reality and a failed submission is
    /// retried on the next crank.
    pub fn handle_submission_result(
        &mut self,
        tx: &ChainTransaction,
        accepted: bool,
    ) -> EngineResult<EngineResponse> {
        let channel_id = tx.channel_id();
        if !accepted {
            warn!(kind = tx.kind(), "chain submission failed; objective stays open");
            for id in self.objectives.for_channel(channel_id) {
                if let Some(objective) = self.objectives.get_mut(&id) {
                    match tx {
                        ChainTransaction::Deposit { .. } => objective.deposit_in_flight = false,
                        ChainTransaction::Conclude { .. } => objective.conclude_submitted = false,
                        ChainTransaction::TransferAllAssets { .. }
                        | ChainTransaction::Claim { .. } => objective.transfer_submitted = false,
                        _ => {}
                    }
                }
            }
            if let Some(mirror) = self.mirrors.get_mut(&channel_id) {
                mirror.defense_submitted = false;
            }
        }
        let mut response = EngineResponse::default();
        self.crank_channel(channel_id, &mut response)?;
        self.finish(Some(channel_id), response)
    }

    // =========================================================================
    // API: QUERIES & SYNC
    // =========================================================================

    /// Snapshot one channel.
    pub fn get_state(&self, channel_id: ChannelId) -> EngineResult<ChannelResult> {
        self.records
            .get(&channel_id)
            .map(channel_result)
            .ok_or(EngineError::UnknownChannel)
    }

    /// Snapshot every channel.
    pub fn get_channels(&self) -> Vec<ChannelResult> {
        let mut results: Vec<ChannelResult> = self.records.values().map(channel_result).collect();
        results.sort_by_key(|r| r.channel_id);
        results
    }

    /// Re-send everything we hold for a channel to every peer. Heals peers
    /// that missed messages.
    pub fn sync_channel(&mut self, channel_id: ChannelId) -> EngineResult<EngineResponse> {
        let record = self.records.get(&channel_id).ok_or(EngineError::UnknownChannel)?;
        let states: Vec<SignedState> = record.signed_states().cloned().collect();
        let objectives: Vec<Objective> = self
            .objectives
            .for_channel(channel_id)
            .iter()
            .filter_map(|id| self.objectives.get(id))
            .map(|record| record.objective.clone())
            .collect();

        let mut response = EngineResponse::default();
        self.notify_peers(channel_id, objectives, states, &mut response);
        self.finish(Some(channel_id), response)
    }

    // =========================================================================
    // INGESTION
    // =========================================================================

    /// Register an incoming objective proposal. Returns the channel to
    /// crank, or `None` when the proposal is not for us.
    fn ingest_objective(&mut self, objective: Objective) -> EngineResult<Option<ChannelId>> {
        let target = objective.target_channel();
        match &objective {
            Objective::OpenChannel(open) => {
                if turnstile_crypto::channel_id(&open.fixed) != open.target_channel {
                    return Err(EngineError::ChannelIdMismatch);
                }
                let Some(my_index) = open.fixed.index_of(&self.signer.address()) else {
                    warn!("open proposal for a channel we do not participate in");
                    return Ok(None);
                };
                self.records
                    .entry(open.target_channel)
                    .or_insert_with(|| ChannelRecord::new(open.fixed.clone(), my_index));
                self.participants
                    .entry(open.target_channel)
                    .or_insert_with(|| open.participants.clone());
                // The application decides whether to join; the objective
                // stays unapproved until then.
                self.objectives.register(objective, false, false);
            }
            // Cooperative closes and funding sub-objectives follow from an
            // open the application already approved.
            Objective::CloseChannel(_)
            | Objective::FundLedgerChannel(_)
            | Objective::FundVirtualChannel(_)
            | Objective::Defund(_) => {
                self.objectives.register(objective, true, false);
            }
        }
        Ok(Some(target))
    }

    /// Validate and store an incoming signed state. Returns the channel to
    /// crank when the state was usable.
    fn ingest_signed_state(&mut self, signed: SignedState) -> Option<ChannelId> {
        let channel_id = signed.channel_id();
        let Some(record) = self.records.get_mut(&channel_id) else {
            warn!("state for an unknown channel dropped; peer should sync");
            return None;
        };

        // Structural validation for fresh running states: turn taking and
        // outcome conservation, with the app validator as escape hatch.
        let n = record.fixed().num_participants() as u64;
        let is_new = record.state_at(signed.turn_num()).is_none();
        if is_new && !signed.state.is_final && signed.turn_num() >= 2 * n {
            if let Some(supported) = record.supported_state() {
                let mover = record.fixed().mover_index(signed.turn_num());
                if let Err(err) = validate_update(
                    record.fixed(),
                    &supported.state,
                    &signed.state,
                    mover,
                    self.validator.as_ref(),
                ) {
                    warn!(error = %err, "rejected incoming state");
                    return None;
                }
            }
        }

        let is_final = signed.state.is_final;
        match record.add_state(signed) {
            Ok(()) => {
                // A peer proposing a final state is asking to close; track a
                // close objective so the countersign crank runs even if the
                // explicit proposal was lost in transit.
                if is_final {
                    self.objectives.register(
                        Objective::CloseChannel(CloseChannel {
                            target_channel: channel_id,
                        }),
                        true,
                        false,
                    );
                }
                Some(channel_id)
            }
            Err(err) => {
                debug!(error = %err, "incoming state not applied");
                None
            }
        }
    }

    // =========================================================================
    // CRANKING
    // =========================================================================

    /// Crank every live objective touching a channel.
    fn crank_channel(
        &mut self,
        channel_id: ChannelId,
        response: &mut EngineResponse,
    ) -> EngineResult<()> {
        for objective_id in self.objectives.for_channel(channel_id) {
            self.crank_objective(&objective_id, response)?;
        }
        Ok(())
    }

    /// Re-crank one objective until it returns no action twice in a row or
    /// reaches a terminal status.
    fn crank_objective(
        &mut self,
        objective_id: &str,
        response: &mut EngineResponse,
    ) -> EngineResult<()> {
        let mut noop_streak = 0;
        // Cranks are deterministic, so a bounded loop is a safety net, not a
        // correctness requirement.
        for _ in 0..16 {
            let Some(action) = self.evaluate(objective_id) else {
                return Ok(());
            };
            match action {
                Action::NoAction => {
                    noop_streak += 1;
                    if noop_streak >= 2 {
                        return Ok(());
                    }
                }
                Action::SignState { channel_id, sign } => {
                    noop_streak = 0;
                    let record =
                        self.records.get_mut(&channel_id).ok_or(EngineError::UnknownChannel)?;
                    let signed = apply_sign_action(record, &sign, self.signer.as_ref())?;
                    self.notify_peers(channel_id, Vec::new(), vec![signed], response);
                }
                Action::SubmitTransaction(tx) => {
                    noop_streak = 0;
                    if let Some(objective) = self.objectives.get_mut(objective_id) {
                        match &tx {
                            ChainTransaction::Deposit { .. } => objective.deposit_in_flight = true,
                            ChainTransaction::Conclude { .. } => {
                                objective.conclude_submitted = true
                            }
                            ChainTransaction::TransferAllAssets { .. }
                            | ChainTransaction::Claim { .. } => {
                                objective.transfer_submitted = true
                            }
                            _ => {}
                        }
                    }
                    response.chain_requests.push(tx);
                }
                Action::RecordFunding {
                    channel_id,
                    asset,
                    amount,
                } => {
                    noop_streak = 0;
                    if let Some(record) = self.records.get_mut(&channel_id) {
                        record.set_holding(asset, amount);
                    }
                    // The funded channel's own protocols can now move (its
                    // postfund round was gated on this); recursion is
                    // bounded because the holding is already recorded.
                    self.crank_channel(channel_id, response)?;
                }
                Action::Complete(outcome) => {
                    self.objectives.complete(objective_id, outcome);
                    response.objectives.push(ObjectiveStatus {
                        objective_id: objective_id.to_string(),
                        outcome: Some(outcome),
                    });
                    return Ok(());
                }
            }
        }
        warn!(objective_id, "crank did not reach a fixpoint within bounds");
        Ok(())
    }

    /// Evaluate one objective's crank against current state.
    fn evaluate(&self, objective_id: &str) -> Option<Action> {
        let record = self.objectives.get(objective_id)?;
        let approved = record.approved_by_me;

        let action = match &record.objective {
            Objective::OpenChannel(open) => {
                let app = self.records.get(&open.target_channel)?;
                crank_open(&OpenState {
                    approved,
                    strategy: open.funding_strategy,
                    deposit_in_flight: record.deposit_in_flight,
                    app,
                })
            }
            Objective::CloseChannel(close) => {
                let app = self.records.get(&close.target_channel)?;
                crank_close(&CloseState {
                    approved,
                    originated_locally: record.originated_locally,
                    conclude_submitted: record.conclude_submitted,
                    transfer_submitted: record.transfer_submitted,
                    app,
                })
            }
            Objective::FundLedgerChannel(fund) => {
                let app = self.records.get(&fund.target_channel)?;
                let ledger = self.records.get(&fund.ledger_channel)?;
                crank_ledger(&LedgerState {
                    approved,
                    app,
                    ledger,
                })
            }
            Objective::FundVirtualChannel(fund) => {
                let joint = self.records.get(&fund.joint_channel)?;
                let role = match self.records.get(&fund.target_channel) {
                    Some(app) => VirtualRole::Endpoint { app },
                    None => VirtualRole::Hub,
                };
                crank_virtual(&VirtualState {
                    approved,
                    joint,
                    target_channel: fund.target_channel,
                    hub: fund.hub,
                    role,
                })
            }
            Objective::Defund(defund) => {
                let app = self.records.get(&defund.target_channel)?;
                crank_defund(&DefundState {
                    transfer_submitted: record.transfer_submitted,
                    app,
                })
            }
        };
        Some(action)
    }

    /// Answer an active challenge, once per challenge registration.
    fn defend(
        &mut self,
        channel_id: ChannelId,
        response: &mut EngineResponse,
    ) -> EngineResult<()> {
        let now = self.chain_time;
        let Some(record) = self.records.get(&channel_id) else {
            return Ok(());
        };
        let Some(mirror) = self.mirrors.get(&channel_id) else {
            return Ok(());
        };
        if mirror.defense_submitted {
            return Ok(());
        }

        match crank_defense(record, &mirror.record, now) {
            DefenseAction::NoAction | DefenseAction::AcceptLoss => Ok(()),
            DefenseAction::Checkpoint => {
                let tx = ChainTransaction::Checkpoint {
                    fixed: record.fixed().clone(),
                    support: record.support_proof(),
                };
                response.chain_requests.push(tx);
                if let Some(mirror) = self.mirrors.get_mut(&channel_id) {
                    mirror.defense_submitted = true;
                }
                Ok(())
            }
            DefenseAction::Respond => {
                let fixed = record.fixed().clone();
                let record =
                    self.records.get_mut(&channel_id).ok_or(EngineError::UnknownChannel)?;
                let signed = record.sign_and_add(StateUpdate::default(), self.signer.as_ref())?;
                self.notify_peers(channel_id, Vec::new(), vec![signed.clone()], response);
                response.chain_requests.push(ChainTransaction::Respond {
                    fixed,
                    response: signed,
                });
                if let Some(mirror) = self.mirrors.get_mut(&channel_id) {
                    mirror.defense_submitted = true;
                }
                Ok(())
            }
        }
    }

    // =========================================================================
    // OUTPUT
    // =========================================================================

    /// Queue a notice for every peer of a channel.
    fn notify_peers(
        &self,
        channel_id: ChannelId,
        objectives: Vec<Objective>,
        signed_states: Vec<SignedState>,
        response: &mut EngineResponse,
    ) {
        let Some(participants) = self.participants.get(&channel_id) else {
            return;
        };
        for peer in participants {
            if peer.participant_id == self.config.participant_id {
                continue;
            }
            let mut message = Message::new();
            message.objectives.extend(objectives.iter().cloned());
            message.signed_states.extend(signed_states.iter().cloned());
            if message.is_empty() {
                continue;
            }
            response.outbox.push(Notice {
                recipient: peer.participant_id.clone(),
                sender: self.config.participant_id.clone(),
                message,
            });
        }
    }

    /// Merge the outbox and attach the channel snapshot.
    fn finish(
        &self,
        channel_id: Option<ChannelId>,
        mut response: EngineResponse,
    ) -> EngineResult<EngineResponse> {
        response.outbox = merge_outgoing(std::mem::take(&mut response.outbox));
        response.channel_result =
            channel_id.and_then(|id| self.records.get(&id)).map(channel_result);
        Ok(response)
    }
}

fn channel_result(record: &ChannelRecord) -> ChannelResult {
    let supported = record.supported_state();
    ChannelResult {
        channel_id: record.channel_id(),
        turn_num: supported.map(|s| s.turn_num()),
        stage: record.stage(),
        outcome: supported.map(|s| s.state.outcome.clone()),
        funded: record.is_funded(),
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
