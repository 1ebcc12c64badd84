//! # Close Channel Protocol
//!
//! Agree a final state off-chain, conclude on-chain, then release the funds.
//! Defunding is triggered only after the final state carries every
//! participant's signature; a half-signed final state concludes nothing.

use turnstile_types::{ChainTransaction, ObjectiveOutcome};

use crate::actions::{Action, SignAction};
use crate::state::{defunded, signed_by_me, CloseState, DefundState};
use turnstile_store::StateUpdate;

/// One crank of the close-channel protocol.
pub fn crank_close(view: &CloseState) -> Action {
    if !view.approved {
        return Action::NoAction;
    }
    let app = view.app;
    let channel_id = app.channel_id();

    // On-chain conclusion observed: release funds, then retire.
    if app.is_finalized_on_chain() {
        if defunded(app) {
            return Action::Complete(ObjectiveOutcome::Success);
        }
        if view.originated_locally && !view.transfer_submitted {
            return Action::SubmitTransaction(ChainTransaction::TransferAllAssets {
                channel_id,
            });
        }
        return Action::NoAction;
    }

    let latest_final = app.signed_states().filter(|s| s.state.is_final).last();
    match latest_final {
        None => {
            // Sign a final state once every prior turn is supported.
            let Some(supported) = app.supported_state() else {
                return Action::NoAction;
            };
            if supported.turn_num() + 1 != app.next_turn() {
                return Action::NoAction;
            }
            Action::SignState {
                channel_id,
                sign: SignAction::Next(StateUpdate {
                    turn_num: None,
                    is_final: true,
                    app_data: None,
                    outcome: None,
                }),
            }
        }
        Some(finale) => {
            let turn_num = finale.turn_num();
            if !signed_by_me(app, turn_num) {
                return Action::SignState {
                    channel_id,
                    sign: SignAction::Countersign { turn_num },
                };
            }
            let unanimous = app
                .signers_at(turn_num)
                .is_some_and(|signers| signers.len() == app.fixed().num_participants());
            if unanimous && view.originated_locally && !view.conclude_submitted {
                return Action::SubmitTransaction(ChainTransaction::Conclude {
                    fixed: app.fixed().clone(),
                    finale: finale.clone(),
                });
            }
            Action::NoAction
        }
    }
}

/// One crank of the defund protocol: release a channel that finalized via
/// challenge expiry rather than a cooperative close.
pub fn crank_defund(view: &DefundState) -> Action {
    let app = view.app;
    if !app.is_finalized_on_chain() {
        return Action::NoAction;
    }
    if defunded(app) {
        return Action::Complete(ObjectiveOutcome::Success);
    }
    if !view.transfer_submitted {
        return Action::SubmitTransaction(ChainTransaction::TransferAllAssets {
            channel_id: app.channel_id(),
        });
    }
    Action::NoAction
}
