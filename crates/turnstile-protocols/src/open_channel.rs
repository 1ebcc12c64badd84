//! # Open Channel Protocol
//!
//! Drives a channel from proposal to running: prefund round, funding,
//! postfund round. Postfund signatures are withheld until the funding target
//! is met, so a participant never commits to an outcome the chain cannot pay.

use turnstile_types::{FundingStrategy, ObjectiveOutcome};

use crate::actions::{Action, SignAction};
use crate::direct_funding::next_deposit;
use crate::state::{postfund_complete, prefund_complete, signed_by_me, OpenState};

/// One crank of the open-channel protocol.
pub fn crank_open(view: &OpenState) -> Action {
    if !view.approved {
        return Action::NoAction;
    }
    let app = view.app;
    let channel_id = app.channel_id();
    let n = app.fixed().num_participants() as u64;
    let my_prefund = app.my_index() as u64;

    // Prefund round: sign my turn once every earlier turn is stored. The
    // creator's turn-0 signature happens at channel creation, so turn 0
    // showing up unsigned here just means the proposal has not arrived.
    if !signed_by_me(app, my_prefund) {
        let buildable = my_prefund > 0 && (0..my_prefund).all(|t| app.state_at(t).is_some());
        if app.state_at(my_prefund).is_some() || buildable {
            return Action::SignState {
                channel_id,
                sign: SignAction::SetupTurn {
                    turn_num: my_prefund,
                },
            };
        }
        return Action::NoAction;
    }

    if !prefund_complete(app) {
        return Action::NoAction;
    }

    // Funding. Ledger and virtual strategies progress through their own
    // objectives, which record guarantee funding into this channel's view.
    let funded = matches!(view.strategy, FundingStrategy::Fake) || app.is_funded();
    if !funded {
        if matches!(view.strategy, FundingStrategy::Direct) && !view.deposit_in_flight {
            if let Some(tx) = next_deposit(app) {
                return Action::SubmitTransaction(tx);
            }
        }
        return Action::NoAction;
    }

    // Postfund round: same shape as prefund, gated on funding.
    let my_postfund = n + my_prefund;
    if !signed_by_me(app, my_postfund) {
        if (n..my_postfund).all(|t| app.state_at(t).is_some()) {
            return Action::SignState {
                channel_id,
                sign: SignAction::SetupTurn {
                    turn_num: my_postfund,
                },
            };
        }
        return Action::NoAction;
    }

    if postfund_complete(app) {
        return Action::Complete(ObjectiveOutcome::Success);
    }
    Action::NoAction
}
