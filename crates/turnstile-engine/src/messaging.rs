//! # Message Reconciler
//!
//! A single crank cascade can emit several notices for the same peer; the
//! reconciler merges them into one message per `(recipient, sender)` pair,
//! unions signatures for duplicate states, and orders states turn-ascending
//! so peers apply them in one pass.

use turnstile_types::{Message, Notice, SignedState};

/// Merge and deduplicate a batch of outbound notices.
///
/// Idempotent: merging an already-merged batch changes nothing.
pub fn merge_outgoing(notices: Vec<Notice>) -> Vec<Notice> {
    // Group by (recipient, sender), preserving first-seen order.
    let mut merged: Vec<Notice> = Vec::new();
    for notice in notices {
        match merged
            .iter()
            .position(|m| m.recipient == notice.recipient && m.sender == notice.sender)
        {
            Some(index) => merge_message(&mut merged[index].message, notice.message),
            None => merged.push(notice),
        }
    }
    for notice in &mut merged {
        normalize(&mut notice.message);
    }
    merged
}

fn merge_message(into: &mut Message, from: Message) {
    for objective in from.objectives {
        if !into.objectives.contains(&objective) {
            into.objectives.push(objective);
        }
    }
    for signed in from.signed_states {
        merge_signed_state(&mut into.signed_states, signed);
    }
}

/// Union a signed state into a batch: same `(channel, turn)` with the same
/// state merges signatures; an identical signer set is dropped outright.
fn merge_signed_state(batch: &mut Vec<SignedState>, signed: SignedState) {
    match batch
        .iter()
        .position(|existing| existing.state == signed.state)
    {
        Some(index) => {
            batch[index].merge_signatures(&signed);
        }
        None => batch.push(signed),
    }
}

fn normalize(message: &mut Message) {
    // Ordering is irrelevant to correctness but turn-ascending lets peers
    // apply states in a single pass.
    message
        .signed_states
        .sort_by_key(|signed| (signed.channel_id(), signed.turn_num()));
}
