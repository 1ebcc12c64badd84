//! # Support Calculus
//!
//! A state is *supported* when a contiguous run of signed states ending at it
//! carries signatures covering every participant at the correct turn numbers:
//! each earlier state in the run must be signed by its mover, and the run
//! never reaches back more than one round of turns. The length-1 case is a
//! single state signed by everyone (setup states).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use turnstile_types::{FixedPart, SignedState};

/// A stored state plus the participant indices recovered from its signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    /// The signed state as received or produced.
    pub signed: SignedState,
    /// Participant indices whose signatures were recovered on this state.
    pub signer_indices: BTreeSet<usize>,
}

/// True when the run of states ending at `turn_num` supports it.
pub fn is_supported(
    fixed: &FixedPart,
    states: &BTreeMap<u64, StoredState>,
    turn_num: u64,
) -> bool {
    let num_participants = fixed.num_participants();
    let Some(candidate) = states.get(&turn_num) else {
        return false;
    };

    // Signatures on the candidate itself all count.
    let mut covered = candidate.signer_indices.clone();

    // Walk back through the contiguous run, at most one round of turns.
    let mut t = turn_num;
    while covered.len() < num_participants {
        if t == 0 || turn_num - (t - 1) >= num_participants as u64 {
            break;
        }
        t -= 1;
        let Some(earlier) = states.get(&t) else {
            break;
        };
        let mover = fixed.mover_index(t);
        // An earlier state contributes only its mover's signature; anything
        // else on it does not commit that signer to the candidate.
        if !earlier.signer_indices.contains(&mover) {
            break;
        }
        covered.insert(mover);
    }

    covered.len() == num_participants
}

/// Highest supported turn number, if any.
pub fn supported_turn(fixed: &FixedPart, states: &BTreeMap<u64, StoredState>) -> Option<u64> {
    states
        .keys()
        .rev()
        .copied()
        .find(|turn| is_supported(fixed, states, *turn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_types::{Outcome, SignedState, State};

    fn fixed(n: usize) -> FixedPart {
        FixedPart {
            chain_id: 1,
            participants: (0..n).map(|i| [i as u8 + 1; 20]).collect(),
            channel_nonce: 1,
            app_definition: [0u8; 20],
            challenge_duration: 1000,
        }
    }

    fn stored(turn_num: u64, signer_indices: &[usize]) -> (u64, StoredState) {
        let state = State {
            turn_num,
            is_final: false,
            channel_id: [0u8; 32],
            app_data: Vec::new(),
            outcome: Outcome::default(),
        };
        (
            turn_num,
            StoredState {
                signed: SignedState::unsigned(state),
                signer_indices: signer_indices.iter().copied().collect(),
            },
        )
    }

    #[test]
    fn unanimous_single_state_is_supported() {
        let fixed = fixed(2);
        let states: BTreeMap<_, _> = [stored(0, &[0, 1])].into();
        assert_eq!(supported_turn(&fixed, &states), Some(0));
    }

    #[test]
    fn partial_signatures_are_not_support() {
        let fixed = fixed(2);
        let states: BTreeMap<_, _> = [stored(0, &[0])].into();
        assert_eq!(supported_turn(&fixed, &states), None);
    }

    #[test]
    fn chain_of_mover_signatures_supports_the_head() {
        let fixed = fixed(2);
        // Turn 3 signed by its mover (index 1), turn 2 signed by its mover
        // (index 0): together they support turn 3.
        let states: BTreeMap<_, _> = [stored(2, &[0]), stored(3, &[1])].into();
        assert_eq!(supported_turn(&fixed, &states), Some(3));
    }

    #[test]
    fn gap_in_history_breaks_the_chain() {
        let fixed = fixed(2);
        let states: BTreeMap<_, _> = [stored(1, &[1]), stored(3, &[1])].into();
        assert_eq!(supported_turn(&fixed, &states), None);
    }

    #[test]
    fn non_mover_signature_on_earlier_state_does_not_count() {
        let fixed = fixed(2);
        // Turn 2's mover is index 0, but only index 1 signed it.
        let states: BTreeMap<_, _> = [stored(2, &[1]), stored(3, &[1])].into();
        assert_eq!(supported_turn(&fixed, &states), None);
    }

    #[test]
    fn window_never_spans_more_than_one_round() {
        let fixed = fixed(3);
        // Three participants: turns 4, 5, 6 each signed by their mover
        // support turn 6, but a run stretching to turn 3 would not.
        let states: BTreeMap<_, _> =
            [stored(4, &[1]), stored(5, &[2]), stored(6, &[0])].into();
        assert_eq!(supported_turn(&fixed, &states), Some(6));

        let stretched: BTreeMap<_, _> = [
            stored(3, &[0]),
            stored(4, &[1]),
            stored(5, &[2]),
            stored(6, &[0]),
        ]
        .into();
        // Still turn 6: the extra state is simply outside the window.
        assert_eq!(supported_turn(&fixed, &stretched), Some(6));
    }

    #[test]
    fn highest_supported_turn_wins() {
        let fixed = fixed(2);
        let states: BTreeMap<_, _> =
            [stored(0, &[0, 1]), stored(1, &[1]), stored(2, &[0, 1])].into();
        assert_eq!(supported_turn(&fixed, &states), Some(2));
    }
}
