//! # Challenge Defense
//!
//! When a challenge is registered against a channel we participate in, the
//! engine must answer before the countdown elapses or accept the loss. It
//! must never silently miss a live challenge: this crank runs on every
//! `ChallengeRegistered` event and on every dispute-clock poll.

use tracing::warn;
use turnstile_dispute::ChallengeRecord;
use turnstile_store::ChannelRecord;

/// What the engine should do about an active challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseAction {
    /// We hold a newer supported state: checkpoint it to clear the record.
    Checkpoint,
    /// It is our move: sign the successor state and respond with it.
    Respond,
    /// Nothing beats the challenge; it will finalize at expiry.
    AcceptLoss,
    /// No live challenge against us (none active, expired, or our own).
    NoAction,
}

/// One crank of the defense protocol.
pub fn crank_defense(
    app: &ChannelRecord,
    challenge: &ChallengeRecord,
    now: u64,
) -> DefenseAction {
    if !challenge.is_active() || challenge.is_expired(now) {
        return DefenseAction::NoAction;
    }
    if challenge.challenger == app.my_address() {
        // Our own challenge; the counterparty answers or time runs out.
        return DefenseAction::NoAction;
    }

    let supported_turn = app.supported_state().map(|s| s.turn_num());
    if supported_turn.is_some_and(|turn| turn > challenge.turn_num_record) {
        return DefenseAction::Checkpoint;
    }

    // No newer state to show. If the successor is ours to sign, respond.
    let response_turn = challenge.turn_num_record + 1;
    if app.is_my_turn(response_turn)
        && supported_turn == Some(challenge.turn_num_record)
    {
        return DefenseAction::Respond;
    }

    warn!(
        turn_num_record = challenge.turn_num_record,
        finalizes_at = challenge.finalizes_at,
        "challenge cannot be answered; accepting loss"
    );
    DefenseAction::AcceptLoss
}
