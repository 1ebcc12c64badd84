//! # Signed States
//!
//! A [`State`] plus the participant signatures collected over its hash.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::entities::{ChannelId, Signature, State};

/// A state with zero or more participant signatures.
///
/// Signatures are deterministic (RFC 6979) over the state hash, so two
/// signatures byte-equal exactly when they come from the same signer. Merging
/// therefore unions by signature bytes.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedState {
    /// The underlying state.
    pub state: State,
    /// Recoverable signatures over the state hash.
    #[serde_as(as = "Vec<Bytes>")]
    pub signatures: Vec<Signature>,
}

impl SignedState {
    /// Wrap a state with a single signature.
    pub fn new(state: State, signature: Signature) -> Self {
        Self {
            state,
            signatures: vec![signature],
        }
    }

    /// Wrap a state with no signatures yet.
    pub fn unsigned(state: State) -> Self {
        Self {
            state,
            signatures: Vec::new(),
        }
    }

    /// Channel this signed state belongs to.
    pub fn channel_id(&self) -> ChannelId {
        self.state.channel_id
    }

    /// Turn number of the underlying state.
    pub fn turn_num(&self) -> u64 {
        self.state.turn_num
    }

    /// Add a signature if not already present. Returns true if it was new.
    pub fn add_signature(&mut self, signature: Signature) -> bool {
        if self.signatures.iter().any(|s| s[..] == signature[..]) {
            return false;
        }
        self.signatures.push(signature);
        true
    }

    /// Union another signed state's signatures into this one.
    ///
    /// Returns the number of new signatures absorbed. The caller must ensure
    /// both wrap the same state.
    pub fn merge_signatures(&mut self, other: &SignedState) -> usize {
        other
            .signatures
            .iter()
            .filter(|s| self.add_signature(**s))
            .count()
    }

    /// True when the two records carry identical signer sets.
    pub fn same_signer_set(&self, other: &SignedState) -> bool {
        self.signatures.len() == other.signatures.len()
            && self
                .signatures
                .iter()
                .all(|s| other.signatures.iter().any(|o| o[..] == s[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;

    fn state(turn_num: u64) -> State {
        State {
            turn_num,
            is_final: false,
            channel_id: [7u8; 32],
            app_data: Vec::new(),
            outcome: Outcome::default(),
        }
    }

    fn sig(byte: u8) -> Signature {
        [byte; 65]
    }

    #[test]
    fn add_signature_dedupes() {
        let mut signed = SignedState::new(state(1), sig(1));
        assert!(!signed.add_signature(sig(1)));
        assert!(signed.add_signature(sig(2)));
        assert_eq!(signed.signatures.len(), 2);
    }

    #[test]
    fn merge_unions_disjoint_signers() {
        let mut a = SignedState::new(state(1), sig(1));
        let b = SignedState::new(state(1), sig(2));

        assert_eq!(a.merge_signatures(&b), 1);
        assert_eq!(a.signatures.len(), 2);
        // Merging again absorbs nothing
        assert_eq!(a.merge_signatures(&b), 0);
    }

    #[test]
    fn same_signer_set_ignores_order() {
        let mut a = SignedState::new(state(1), sig(1));
        a.add_signature(sig(2));
        let mut b = SignedState::new(state(1), sig(2));
        b.add_signature(sig(1));

        assert!(a.same_signer_set(&b));
        b.add_signature(sig(3));
        assert!(!a.same_signer_set(&b));
    }
}
