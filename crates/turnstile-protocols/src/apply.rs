//! # Action Application
//!
//! Executes a [`SignAction`](crate::actions::SignAction) against a channel
//! record. This is the only place a crank's signing request turns into an
//! actual signature, so the scheduler and every test drive the same path.

use turnstile_crypto::{state_hash, StateSigner};
use turnstile_store::ChannelRecord;
use turnstile_types::{SignedState, State};

use crate::actions::SignAction;
use crate::error::{ProtocolError, ProtocolResult};

/// Produce and store the signature a crank asked for, returning the signed
/// state to relay to peers.
pub fn apply_sign_action(
    record: &mut ChannelRecord,
    sign: &SignAction,
    signer: &dyn StateSigner,
) -> ProtocolResult<SignedState> {
    match sign {
        SignAction::Countersign { turn_num } => {
            record.countersign(*turn_num, signer).map_err(ProtocolError::from)
        }
        SignAction::SetupTurn { turn_num } => {
            if record.state_at(*turn_num).is_some() {
                return record
                    .countersign(*turn_num, signer)
                    .map_err(ProtocolError::from);
            }
            // Setup turns copy the previous turn's content.
            let previous = record
                .state_at(turn_num.checked_sub(1).ok_or(ProtocolError::ChannelNotReady(
                    "turn 0 is created by the channel opener, not cranked",
                ))?)
                .ok_or(ProtocolError::ChannelNotReady("previous setup turn missing"))?;

            let state = State {
                turn_num: *turn_num,
                is_final: false,
                channel_id: record.channel_id(),
                app_data: previous.state.app_data.clone(),
                outcome: previous.state.outcome.clone(),
            };
            let hash = state_hash(record.fixed(), &state);
            let signed = SignedState::new(state, signer.sign(&hash));
            record.add_state(signed.clone())?;
            Ok(signed)
        }
        SignAction::Next(update) => record
            .sign_and_add(update.clone(), signer)
            .map_err(ProtocolError::from),
    }
}
