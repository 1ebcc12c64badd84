//! # Wire Messages
//!
//! The peer-to-peer payload: objectives proposed to the counterparty plus
//! signed states, stamped with the sending engine's version.

use serde::{Deserialize, Serialize};

use crate::objective::Objective;
use crate::signed_state::SignedState;

/// Engine version stamped on every outgoing message.
pub const WALLET_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The payload exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    /// Version of the engine that produced this message.
    pub wallet_version: String,
    /// Objectives proposed to the recipient.
    pub objectives: Vec<Objective>,
    /// Signed states for channels the recipient participates in.
    pub signed_states: Vec<SignedState>,
}

impl Message {
    /// An empty message at the current wallet version.
    pub fn new() -> Self {
        Self {
            wallet_version: WALLET_VERSION.to_string(),
            objectives: Vec::new(),
            signed_states: Vec::new(),
        }
    }

    /// True when the message carries nothing.
    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty() && self.signed_states.is_empty()
    }
}

/// An outbound message addressed to a peer.
///
/// Notices destined for the same `(recipient, sender)` pair are merged by the
/// reconciler before leaving the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Routing id of the peer this message is for.
    pub recipient: String,
    /// Routing id of the local participant.
    pub sender: String,
    /// The payload.
    pub message: Message,
}
