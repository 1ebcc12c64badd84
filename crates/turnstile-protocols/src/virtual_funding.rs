//! # Virtual Funding
//!
//! A channel between two endpoints is funded through a joint channel they
//! share with a hub. The guarantee update debits both endpoints by their
//! share, credits the target channel, and leaves the hub's allocation
//! untouched. Endpoints validate the exact transform; the hub validates that
//! nothing it owns moves and nobody's allocation grows except the guarantee
//! itself, so a misbehaving hub cannot turn the relay into an unbacked claim.

use tracing::debug;
use turnstile_types::{Destination, ObjectiveOutcome, Outcome};

use crate::actions::{Action, SignAction};
use crate::ledger_funding::crank_ledger;
use crate::state::{postfund_complete, signed_by_me, LedgerState, VirtualRole, VirtualState};

/// One crank of the virtual-funding protocol.
pub fn crank_virtual(view: &VirtualState) -> Action {
    if !view.approved {
        return Action::NoAction;
    }
    match view.role {
        // An endpoint drives the joint channel exactly like a ledger
        // channel: the same transform, proposal and countersign rules apply.
        VirtualRole::Endpoint { app } => crank_ledger(&LedgerState {
            approved: view.approved,
            app,
            ledger: view.joint,
        }),
        VirtualRole::Hub => crank_hub(view),
    }
}

/// The hub never proposes; it countersigns guarantee updates that pass its
/// own safety check and completes once the guarantee is unanimous.
fn crank_hub(view: &VirtualState) -> Action {
    let joint = view.joint;
    if !postfund_complete(joint) {
        return Action::NoAction;
    }
    let Some(supported) = joint.supported_state() else {
        return Action::NoAction;
    };
    let guarantee_dest = Destination::from_channel(view.target_channel);
    let hub_dest =
        Destination::from_address(joint.fixed().participants[joint.my_index()]);

    let credits = |outcome: &Outcome| {
        outcome
            .assets()
            .any(|asset| !asset.allocated_to(&guarantee_dest).is_zero())
    };

    let supported_turn = supported.turn_num();
    let guarantee_turn = if credits(&supported.state.outcome) {
        Some(supported_turn)
    } else {
        joint.state_at(supported_turn + 1).and_then(|head| {
            credits(&head.state.outcome).then_some(supported_turn + 1)
        })
    };
    let Some(guarantee_turn) = guarantee_turn else {
        return Action::NoAction;
    };

    let (Some(parent), Some(guarantee_state)) = (
        guarantee_turn.checked_sub(1).and_then(|t| joint.state_at(t)),
        joint.state_at(guarantee_turn),
    ) else {
        return Action::NoAction;
    };
    if !hub_safe(
        &parent.state.outcome,
        &guarantee_state.state.outcome,
        &guarantee_dest,
        &hub_dest,
    ) {
        debug!(guarantee_turn, "refusing guarantee that moves hub funds");
        return Action::NoAction;
    }

    if !signed_by_me(joint, guarantee_turn) {
        return Action::SignState {
            channel_id: joint.channel_id(),
            sign: SignAction::Countersign {
                turn_num: guarantee_turn,
            },
        };
    }
    let unanimous = joint
        .signers_at(guarantee_turn)
        .is_some_and(|signers| signers.len() == joint.fixed().num_participants());
    if unanimous {
        return Action::Complete(ObjectiveOutcome::Success);
    }
    Action::NoAction
}

/// The hub's guarantee safety check.
///
/// Per asset: totals conserved, the hub's own allocation unchanged, and no
/// destination other than the guarantee gains anything.
fn hub_safe(
    prev: &Outcome,
    next: &Outcome,
    guarantee_dest: &Destination,
    hub_dest: &Destination,
) -> bool {
    if prev.0.len() != next.0.len() {
        return false;
    }
    prev.assets().zip(next.assets()).all(|(before, after)| {
        if before.asset != after.asset || before.total() != after.total() {
            return false;
        }
        if before.allocated_to(hub_dest) != after.allocated_to(hub_dest) {
            return false;
        }
        after.allocations.iter().all(|allocation| {
            allocation.destination == *guarantee_dest
                || after.allocated_to(&allocation.destination)
                    <= before.allocated_to(&allocation.destination)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_funding::guarantee_outcome;
    use crate::testing::{apply_sign, running_channel, TestChannel};
    use turnstile_store::StateUpdate;
    use turnstile_types::{Allocation, U256, ADDRESS_ZERO};

    /// Joint channel [5, 5, 10] between A, B and the hub funds a target
    /// [3, 2] between A and B.
    fn setup() -> (TestChannel, TestChannel) {
        let joint = running_channel(&[5, 5, 10]);
        let mut target = TestChannel::subset(&joint, &[0, 1], &[3, 2], 7);
        target.create_opening_state(0);
        target.relay_all();

        // Target prefund: B signs turn 1.
        let view = crate::testing::open_view(
            &target.records[1],
            turnstile_types::FundingStrategy::Virtual,
            false,
        );
        let action = crate::open_channel::crank_open(&view);
        apply_sign(&mut target, 1, &action);
        target.relay_all();
        (joint, target)
    }

    fn endpoint_view<'a>(
        joint: &'a TestChannel,
        target: &'a TestChannel,
        who: usize,
    ) -> VirtualState<'a> {
        VirtualState {
            approved: true,
            joint: &joint.records[who],
            target_channel: target.records[0].channel_id(),
            hub: joint.fixed.participants[2],
            role: VirtualRole::Endpoint {
                app: &target.records[who],
            },
        }
    }

    fn hub_view<'a>(joint: &'a TestChannel, target: &'a TestChannel) -> VirtualState<'a> {
        VirtualState {
            approved: true,
            joint: &joint.records[2],
            target_channel: target.records[0].channel_id(),
            hub: joint.fixed.participants[2],
            role: VirtualRole::Hub,
        }
    }

    #[test]
    fn virtual_funding_happy_path() {
        let (mut joint, mut target) = setup();

        // A proposes the guarantee on the joint channel (its turn).
        let action = crank_virtual(&endpoint_view(&joint, &target, 0));
        assert!(matches!(
            action,
            Action::SignState {
                sign: SignAction::Next(_),
                ..
            }
        ));
        apply_sign(&mut joint, 0, &action);
        joint.relay_all();

        // B and the hub countersign.
        let action = crank_virtual(&endpoint_view(&joint, &target, 1));
        assert!(matches!(
            action,
            Action::SignState {
                sign: SignAction::Countersign { .. },
                ..
            }
        ));
        apply_sign(&mut joint, 1, &action);
        joint.relay_all();

        let action = crank_virtual(&hub_view(&joint, &target));
        assert!(matches!(
            action,
            Action::SignState {
                sign: SignAction::Countersign { .. },
                ..
            }
        ));
        apply_sign(&mut joint, 2, &action);
        joint.relay_all();

        // Unanimous: endpoints record funding, the hub completes.
        let Action::RecordFunding { amount, .. } =
            crank_virtual(&endpoint_view(&joint, &target, 0))
        else {
            panic!("expected funding record");
        };
        assert_eq!(amount, U256::from(5));
        assert!(matches!(
            crank_virtual(&hub_view(&joint, &target)),
            Action::Complete(ObjectiveOutcome::Success)
        ));

        // The hub's joint allocation never moved.
        let supported = joint.records[2].supported_state().unwrap();
        let asset = supported.state.outcome.for_asset(&ADDRESS_ZERO).unwrap();
        let hub_dest = Destination::from_address(joint.fixed.participants[2]);
        assert_eq!(asset.allocated_to(&hub_dest), U256::from(10));
    }

    #[test]
    fn hub_refuses_guarantee_that_debits_it() {
        let (mut joint, target) = setup();

        // A proposes a "guarantee" paid out of the hub's allocation.
        let supported = joint.records[0].supported_state().unwrap().clone();
        let mut outcome = supported.state.outcome.clone();
        let hub_dest = Destination::from_address(joint.fixed.participants[2]);
        let entry = outcome.0[0]
            .allocations
            .iter_mut()
            .find(|a| a.destination == hub_dest)
            .unwrap();
        entry.amount -= U256::from(5);
        outcome.0[0].allocations.push(Allocation {
            destination: Destination::from_channel(target.records[0].channel_id()),
            amount: U256::from(5),
        });

        let action = Action::SignState {
            channel_id: joint.records[0].channel_id(),
            sign: SignAction::Next(StateUpdate {
                turn_num: Some(supported.turn_num() + 1),
                is_final: false,
                app_data: None,
                outcome: Some(outcome),
            }),
        };
        apply_sign(&mut joint, 0, &action);
        joint.relay_all();

        assert!(crank_virtual(&hub_view(&joint, &target)).is_noop());
    }

    #[test]
    fn endpoint_refuses_inflated_guarantee() {
        let (mut joint, target) = setup();

        // The transform is computed, then the guarantee credit is inflated
        // beyond the endpoints' debits.
        let supported = joint.records[0].supported_state().unwrap().clone();
        let mut outcome = guarantee_outcome(
            &supported.state.outcome,
            &target.records[0].state_at(0).unwrap().state.outcome,
            target.records[0].channel_id(),
        )
        .unwrap();
        let guarantee_dest = Destination::from_channel(target.records[0].channel_id());
        let entry = outcome.0[0]
            .allocations
            .iter_mut()
            .find(|a| a.destination == guarantee_dest)
            .unwrap();
        entry.amount += U256::from(3);

        let action = Action::SignState {
            channel_id: joint.records[0].channel_id(),
            sign: SignAction::Next(StateUpdate {
                turn_num: Some(supported.turn_num() + 1),
                is_final: false,
                app_data: None,
                outcome: Some(outcome),
            }),
        };
        apply_sign(&mut joint, 0, &action);
        joint.relay_all();

        // B's endpoint validation refuses the mismatch, and so does the hub
        // (totals are no longer conserved).
        assert!(crank_virtual(&endpoint_view(&joint, &target, 1)).is_noop());
        assert!(crank_virtual(&hub_view(&joint, &target)).is_noop());
    }
}
