//! # Application Transition Validation
//!
//! Application logic inside a channel is opaque to the engine: an update is
//! checked for structural soundness here (turn taking, conservation) and then
//! handed to an [`AppTransitionValidator`] for whatever domain rules the
//! channel's app definition encodes.

use turnstile_types::{FixedPart, State};

use crate::error::{ProtocolError, ProtocolResult};

/// The opaque app state transition validator capability.
pub trait AppTransitionValidator: Send + Sync {
    /// True if the app rules allow `to` to follow `from`.
    fn valid_transition(&self, fixed: &FixedPart, from: &State, to: &State) -> bool;

    /// True if the app explicitly authorizes this transition to change
    /// allocation totals. Conservation is the engine's rule; only an app
    /// that opts in may relax it.
    fn allows_redistribution(&self, _fixed: &FixedPart, _from: &State, _to: &State) -> bool {
        false
    }
}

/// Accepts every conserving transition. The default for channels whose app
/// imposes no extra rules beyond the engine's structural checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysValid;

impl AppTransitionValidator for AlwaysValid {
    fn valid_transition(&self, _fixed: &FixedPart, _from: &State, _to: &State) -> bool {
        true
    }
}

/// Structural validation of a running update against the supported state.
///
/// The proposed state must be the immediate successor, moved by the right
/// participant, and conserve allocation totals per asset unless the app
/// validator explicitly blesses a redistribution.
pub fn validate_update(
    fixed: &FixedPart,
    supported: &State,
    proposed: &State,
    proposer_index: usize,
    validator: &dyn AppTransitionValidator,
) -> ProtocolResult<()> {
    if proposed.turn_num != supported.turn_num + 1 {
        return Err(ProtocolError::OutOfTurnUpdate {
            expected_turn: supported.turn_num + 1,
            actual_turn: proposed.turn_num,
        });
    }
    if fixed.mover_index(proposed.turn_num) != proposer_index {
        return Err(ProtocolError::NotMyTurn {
            turn_num: proposed.turn_num,
            mover_index: fixed.mover_index(proposed.turn_num),
        });
    }
    if !supported.outcome.conserves(&proposed.outcome)
        && !validator.allows_redistribution(fixed, supported, proposed)
    {
        return Err(ProtocolError::OutcomeNotConserved {
            turn_num: proposed.turn_num,
        });
    }
    if !validator.valid_transition(fixed, supported, proposed) {
        return Err(ProtocolError::AppRejected {
            turn_num: proposed.turn_num,
        });
    }
    Ok(())
}
