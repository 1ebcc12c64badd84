//! # Ledger Funding
//!
//! A sub-channel is funded out of a ledger channel's allocation instead of a
//! fresh on-chain deposit: the ledger update debits each participant by their
//! share and credits the sub-channel's guarantee in one move. The sub-channel
//! advances only once the ledger update carries every participant's
//! signature.

use tracing::debug;
use turnstile_store::StateUpdate;
use turnstile_types::{ChannelId, Destination, ObjectiveOutcome, Outcome};

use crate::actions::{Action, SignAction};
use crate::error::{ProtocolError, ProtocolResult};
use crate::state::{postfund_complete, prefund_complete, signed_by_me, LedgerState};

/// The ledger outcome after funding `target`: each of the target's
/// allocations is debited from the same destination in the ledger, and the
/// target's total is credited to the guarantee destination.
pub fn guarantee_outcome(
    ledger: &Outcome,
    target: &Outcome,
    target_channel: ChannelId,
) -> ProtocolResult<Outcome> {
    let guarantee_dest = Destination::from_channel(target_channel);
    let mut next = ledger.clone();

    for target_asset in target.assets() {
        let ledger_asset = next
            .0
            .iter_mut()
            .find(|a| a.asset == target_asset.asset)
            .ok_or(ProtocolError::InsufficientLedgerFunds)?;

        for allocation in &target_asset.allocations {
            let entry = ledger_asset
                .allocations
                .iter_mut()
                .find(|a| a.destination == allocation.destination)
                .ok_or(ProtocolError::InsufficientLedgerFunds)?;
            entry.amount = entry
                .amount
                .checked_sub(allocation.amount)
                .ok_or(ProtocolError::InsufficientLedgerFunds)?;
        }

        ledger_asset.allocations.push(turnstile_types::Allocation {
            destination: guarantee_dest,
            amount: target_asset.total(),
        });
    }
    Ok(next)
}

/// True when `outcome` credits the guarantee destination with at least the
/// target's total, per asset.
fn credits_guarantee(outcome: &Outcome, target_outcome: &Outcome, guarantee: &Destination) -> bool {
    target_outcome.assets().all(|asset| {
        outcome
            .for_asset(&asset.asset)
            .is_some_and(|a| a.allocated_to(guarantee) >= asset.total())
    })
}

/// One crank of the ledger-funding protocol.
pub fn crank_ledger(view: &LedgerState) -> Action {
    if !view.approved {
        return Action::NoAction;
    }
    let app = view.app;
    let ledger = view.ledger;
    let target_channel = app.channel_id();
    let guarantee_dest = Destination::from_channel(target_channel);

    // The sub-channel must have agreed its opening outcome, and the ledger
    // channel must itself be funded and running, before funds move.
    if !prefund_complete(app) || !postfund_complete(ledger) {
        return Action::NoAction;
    }
    let Some(opening) = app.state_at(0) else {
        return Action::NoAction;
    };
    let target_outcome = opening.state.outcome.clone();
    let Some(ledger_supported) = ledger.supported_state() else {
        return Action::NoAction;
    };

    // Locate the guarantee state: the supported head, or a pending proposal
    // one turn above it.
    let supported_turn = ledger_supported.turn_num();
    let guarantee_turn = if credits_guarantee(
        &ledger_supported.state.outcome,
        &target_outcome,
        &guarantee_dest,
    ) {
        Some(supported_turn)
    } else {
        ledger.state_at(supported_turn + 1).and_then(|head| {
            credits_guarantee(&head.state.outcome, &target_outcome, &guarantee_dest)
                .then_some(supported_turn + 1)
        })
    };

    if let Some(guarantee_turn) = guarantee_turn {
        // Validate the guarantee against its parent before signing anything:
        // it must equal the deterministic debit-and-credit transform.
        let (Some(parent), Some(guarantee_state)) = (
            guarantee_turn
                .checked_sub(1)
                .and_then(|t| ledger.state_at(t)),
            ledger.state_at(guarantee_turn),
        ) else {
            return Action::NoAction;
        };
        let expected =
            guarantee_outcome(&parent.state.outcome, &target_outcome, target_channel);
        if expected.as_ref() != Ok(&guarantee_state.state.outcome) {
            debug!(guarantee_turn, "refusing mismatched ledger guarantee");
            return Action::NoAction;
        }

        if !signed_by_me(ledger, guarantee_turn) {
            return Action::SignState {
                channel_id: ledger.channel_id(),
                sign: SignAction::Countersign {
                    turn_num: guarantee_turn,
                },
            };
        }
        let unanimous = ledger
            .signers_at(guarantee_turn)
            .is_some_and(|signers| signers.len() == ledger.fixed().num_participants());
        if !unanimous {
            return Action::NoAction;
        }

        // Guarantee fully signed: propagate it into the sub-channel's
        // funding view, then wait out the postfund round.
        for asset in target_outcome.assets() {
            if app.holding(&asset.asset) < asset.total() {
                return Action::RecordFunding {
                    channel_id: target_channel,
                    asset: asset.asset,
                    amount: asset.total(),
                };
            }
        }
        if postfund_complete(app) {
            return Action::Complete(ObjectiveOutcome::Success);
        }
        return Action::NoAction;
    }

    // No guarantee in sight: propose one if it is our turn to move.
    let expected = match guarantee_outcome(
        &ledger_supported.state.outcome,
        &target_outcome,
        target_channel,
    ) {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!("ledger channel cannot cover the guarantee");
            return Action::Complete(ObjectiveOutcome::Failure);
        }
    };
    let next_turn = supported_turn + 1;
    if ledger.state_at(next_turn).is_none() && ledger.is_my_turn(next_turn) {
        return Action::SignState {
            channel_id: ledger.channel_id(),
            sign: SignAction::Next(StateUpdate {
                turn_num: Some(next_turn),
                is_final: false,
                app_data: None,
                outcome: Some(expected),
            }),
        };
    }
    Action::NoAction
}
