//! # Dispute Machine
//!
//! Mirrors the on-chain adjudicator's transition rules. The engine runs the
//! same checks locally before submitting a transaction (a submission that
//! would revert is rejected here first), and the in-memory mock chain runs
//! them as its actual ledger logic. Final authority is always the chain.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use turnstile_crypto::{outcome_hash, recover_signer, state_hash};
use turnstile_store::{is_supported, StoredState};
use turnstile_types::{Address, ChannelId, FixedPart, Outcome, SignedState, ADDRESS_ZERO};

use crate::challenge::ChallengeRecord;
use crate::error::{DisputeError, DisputeResult};

/// One channel's dispute state machine.
///
/// `Open -> Challenged -> (Responded -> Open) | (Expired -> Concluded)`, with
/// checkpoint clearing a challenge from any state and conclude short-cutting
/// to finalization on a unanimous final state.
#[derive(Debug, Clone)]
pub struct Adjudicator {
    fixed: FixedPart,
    channel_id: ChannelId,
    record: ChallengeRecord,
    /// False until the first transition writes storage.
    touched: bool,
    /// Set when a unanimous final state concluded the channel.
    concluded_at: Option<u64>,
    /// Outcome that pays out if the channel finalizes.
    payout_outcome: Option<Outcome>,
}

impl Adjudicator {
    /// Fresh storage for a channel: no record, no challenge.
    pub fn new(fixed: FixedPart) -> Self {
        let channel_id = turnstile_crypto::channel_id(&fixed);
        Self {
            fixed,
            channel_id,
            record: ChallengeRecord::default(),
            touched: false,
            concluded_at: None,
            payout_outcome: None,
        }
    }

    /// The channel this machine adjudicates.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Current storage record.
    pub fn record(&self) -> &ChallengeRecord {
        &self.record
    }

    /// The hash the chain would store right now.
    pub fn storage_hash(&self) -> turnstile_types::Hash {
        self.record.storage_hash()
    }

    /// True once the channel can pay out: concluded, or a challenge matured.
    pub fn is_finalized(&self, now: u64) -> bool {
        self.concluded_at.is_some() || self.record.is_expired(now)
    }

    /// The outcome funds are released under, once finalized.
    pub fn payout_outcome(&self, now: u64) -> Option<&Outcome> {
        if self.is_finalized(now) {
            self.payout_outcome.as_ref()
        } else {
            None
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Register a challenge: assert that `support`'s head state is the latest.
    ///
    /// Starts the countdown; a newer state can supersede it until
    /// `finalizes_at`.
    pub fn challenge(
        &mut self,
        support: &[SignedState],
        challenger: Address,
        now: u64,
    ) -> DisputeResult<&ChallengeRecord> {
        self.require_not_finalized(now)?;

        let candidate = self.validate_support(support)?;
        let candidate_turn = candidate.turn_num();
        if self.touched && candidate_turn <= self.record.turn_num_record {
            return Err(DisputeError::InvalidChallenge {
                candidate_turn,
                turn_num_record: self.record.turn_num_record,
            });
        }

        self.record = ChallengeRecord {
            turn_num_record: candidate_turn,
            finalizes_at: now + self.fixed.challenge_duration,
            state_hash: state_hash(&self.fixed, &candidate.state),
            challenger,
            outcome_hash: outcome_hash(&candidate.state.outcome),
        };
        self.touched = true;
        self.payout_outcome = Some(candidate.state.outcome.clone());
        debug!(
            turn_num_record = candidate_turn,
            finalizes_at = self.record.finalizes_at,
            "challenge registered"
        );
        Ok(&self.record)
    }

    /// Answer a challenge with the immediate successor state, signed by the
    /// mover whose turn it is.
    pub fn respond(&mut self, response: &SignedState, now: u64) -> DisputeResult<()> {
        self.require_not_finalized(now)?;
        if !self.record.is_active() {
            return Err(DisputeError::ChallengeNotOngoing);
        }

        let expected_turn = self.record.turn_num_record + 1;
        if response.turn_num() != expected_turn {
            return Err(DisputeError::InvalidResponse {
                expected_turn,
                actual_turn: response.turn_num(),
            });
        }

        // Only the challenger's counter-party may respond, and only with the
        // mover's own signature on the response.
        let mover = self.fixed.mover(response.turn_num());
        if mover == self.record.challenger {
            return Err(DisputeError::ResponseUnauthorized);
        }
        let signers = self.signer_addresses(response);
        if !signers.contains(&mover) {
            return Err(DisputeError::ResponseUnauthorized);
        }

        debug!(turn_num_record = expected_turn, "challenge cleared by response");
        self.record = ChallengeRecord::cleared(expected_turn);
        Ok(())
    }

    /// Prove a challenge stale: a later state signed by the challenger.
    pub fn refute(
        &mut self,
        declared_turn_num_record: u64,
        refutation: &SignedState,
        now: u64,
    ) -> DisputeResult<()> {
        if self.concluded_at.is_some() {
            return Err(DisputeError::AlreadyFinalized);
        }
        if !self.record.is_active() {
            return Err(DisputeError::ChallengeNotOngoing);
        }
        if declared_turn_num_record != self.record.turn_num_record {
            return Err(DisputeError::StateMismatch {
                declared: declared_turn_num_record,
                stored: self.record.turn_num_record,
            });
        }
        if self.record.is_expired(now) {
            return Err(DisputeError::RefuteTooLate);
        }
        if refutation.turn_num() <= declared_turn_num_record {
            return Err(DisputeError::RefutationTurnTooLow {
                refutation_turn: refutation.turn_num(),
                turn_num_record: declared_turn_num_record,
            });
        }
        if !self.signer_addresses(refutation).contains(&self.record.challenger) {
            return Err(DisputeError::UnauthorizedSigner);
        }

        // Storage clears but the turn-number record stays where it was.
        debug!(
            turn_num_record = declared_turn_num_record,
            "challenge cleared by refutation"
        );
        self.record = ChallengeRecord::cleared(declared_turn_num_record);
        Ok(())
    }

    /// Advance the record with a newer supported state, clearing any active
    /// challenge along the way. Valid with or without an ongoing challenge.
    pub fn checkpoint(&mut self, support: &[SignedState], now: u64) -> DisputeResult<()> {
        self.require_not_finalized(now)?;

        let candidate = self.validate_support(support)?;
        let candidate_turn = candidate.turn_num();
        if self.touched && candidate_turn <= self.record.turn_num_record {
            return Err(DisputeError::InvalidChallenge {
                candidate_turn,
                turn_num_record: self.record.turn_num_record,
            });
        }

        debug!(turn_num_record = candidate_turn, "checkpoint recorded");
        self.record = ChallengeRecord::cleared(candidate_turn);
        self.touched = true;
        Ok(())
    }

    /// Finalize immediately on a unanimous final state.
    pub fn conclude(&mut self, finale: &SignedState, now: u64) -> DisputeResult<()> {
        self.require_not_finalized(now)?;

        if !finale.state.is_final {
            return Err(DisputeError::InvalidConclusion);
        }
        let signers = self.signer_indices(finale);
        if signers.len() != self.fixed.num_participants() {
            return Err(DisputeError::InvalidConclusion);
        }

        self.record = ChallengeRecord {
            turn_num_record: self.record.turn_num_record,
            finalizes_at: now,
            state_hash: state_hash(&self.fixed, &finale.state),
            challenger: ADDRESS_ZERO,
            outcome_hash: outcome_hash(&finale.state.outcome),
        };
        self.touched = true;
        self.concluded_at = Some(now);
        self.payout_outcome = Some(finale.state.outcome.clone());
        debug!(at = now, "channel concluded");
        Ok(())
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn require_not_finalized(&self, now: u64) -> DisputeResult<()> {
        if self.is_finalized(now) {
            return Err(DisputeError::AlreadyFinalized);
        }
        Ok(())
    }

    /// Check that `support` is a contiguous run whose head state carries full
    /// support, and return the head.
    fn validate_support<'a>(
        &self,
        support: &'a [SignedState],
    ) -> DisputeResult<&'a SignedState> {
        let head = support.last().ok_or(DisputeError::InvalidChallenge {
            candidate_turn: 0,
            turn_num_record: self.record.turn_num_record,
        })?;
        let invalid = DisputeError::InvalidChallenge {
            candidate_turn: head.turn_num(),
            turn_num_record: self.record.turn_num_record,
        };

        let mut states = BTreeMap::new();
        let mut expected_turn = None;
        for signed in support {
            if signed.channel_id() != self.channel_id {
                return Err(invalid.clone());
            }
            if let Some(expected) = expected_turn {
                if signed.turn_num() != expected {
                    return Err(invalid.clone());
                }
            }
            expected_turn = Some(signed.turn_num() + 1);
            states.insert(
                signed.turn_num(),
                StoredState {
                    signed: signed.clone(),
                    signer_indices: self.signer_indices(signed),
                },
            );
        }

        if !is_supported(&self.fixed, &states, head.turn_num()) {
            return Err(invalid);
        }
        Ok(head)
    }

    /// Participant indices recovered from a state's signatures. Signatures
    /// that fail recovery or name a non-participant contribute nothing.
    fn signer_indices(&self, signed: &SignedState) -> BTreeSet<usize> {
        let hash = state_hash(&self.fixed, &signed.state);
        signed
            .signatures
            .iter()
            .filter_map(|signature| recover_signer(&hash, signature).ok())
            .filter_map(|address| self.fixed.index_of(&address))
            .collect()
    }

    /// Signer addresses recovered from a state's signatures, participants or
    /// not. The refute path compares against the recorded challenger, who may
    /// legitimately be any address the chain saw.
    fn signer_addresses(&self, signed: &SignedState) -> BTreeSet<Address> {
        let hash = state_hash(&self.fixed, &signed.state);
        signed
            .signatures
            .iter()
            .filter_map(|signature| recover_signer(&hash, signature).ok())
            .collect()
    }
}
