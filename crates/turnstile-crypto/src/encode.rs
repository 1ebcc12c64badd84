//! # Canonical Encodings
//!
//! Deterministic 32-byte-word encodings of channel data, mirroring the
//! adjudicator's ABI layout. Every hash the engine compares against chain
//! state is computed here and nowhere else.

use turnstile_types::{Address, ChannelId, FixedPart, Hash, Outcome, State, U256};

use crate::hashing::keccak256;

/// Append a u64 as a left-padded 32-byte word.
fn push_u64(buf: &mut Vec<u8>, value: u64) {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    buf.extend_from_slice(&word);
}

/// Append a bool as a 32-byte word (0 or 1).
fn push_bool(buf: &mut Vec<u8>, value: bool) {
    push_u64(buf, u64::from(value));
}

/// Append an address as a left-padded 32-byte word.
fn push_address(buf: &mut Vec<u8>, address: &Address) {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    buf.extend_from_slice(&word);
}

/// Append a U256 as a big-endian 32-byte word.
fn push_u256(buf: &mut Vec<u8>, value: &U256) {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    buf.extend_from_slice(&word);
}

/// `channelId = keccak256(chainId, participants, channelNonce)`.
///
/// A pure function of the fixed part: two distinct fixed parts collide only
/// if Keccak-256 does.
pub fn channel_id(fixed: &FixedPart) -> ChannelId {
    let mut buf = Vec::with_capacity(32 * (3 + fixed.participants.len()));
    push_u64(&mut buf, fixed.chain_id);
    push_u64(&mut buf, fixed.participants.len() as u64);
    for participant in &fixed.participants {
        push_address(&mut buf, participant);
    }
    push_u64(&mut buf, fixed.channel_nonce);
    keccak256(&buf)
}

/// Hash of an outcome's full allocation table.
pub fn outcome_hash(outcome: &Outcome) -> Hash {
    let mut buf = Vec::new();
    push_u64(&mut buf, outcome.0.len() as u64);
    for asset in outcome.assets() {
        push_address(&mut buf, &asset.asset);
        push_u64(&mut buf, asset.allocations.len() as u64);
        for allocation in &asset.allocations {
            buf.extend_from_slice(&allocation.destination.0);
            push_u256(&mut buf, &allocation.amount);
        }
    }
    keccak256(&buf)
}

/// Hash of the fixed application part plus one state's app data.
pub fn app_part_hash(fixed: &FixedPart, app_data: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(32 * 3);
    push_u64(&mut buf, fixed.challenge_duration);
    push_address(&mut buf, &fixed.app_definition);
    buf.extend_from_slice(&keccak256(app_data));
    keccak256(&buf)
}

/// The hash participants sign: commits to the turn, finality flag, channel,
/// application part and outcome.
pub fn state_hash(fixed: &FixedPart, state: &State) -> Hash {
    let mut buf = Vec::with_capacity(32 * 5);
    push_u64(&mut buf, state.turn_num);
    push_bool(&mut buf, state.is_final);
    buf.extend_from_slice(&state.channel_id);
    buf.extend_from_slice(&app_part_hash(fixed, &state.app_data));
    buf.extend_from_slice(&outcome_hash(&state.outcome));
    keccak256(&buf)
}

/// On-chain channel storage hash:
/// `keccak256(turnNumRecord, finalizesAt, stateHash, challenger, outcomeHash)`.
///
/// All-zero fields denote "no active challenge".
pub fn channel_storage_hash(
    turn_num_record: u64,
    finalizes_at: u64,
    state_hash: &Hash,
    challenger: &Address,
    outcome_hash: &Hash,
) -> Hash {
    let mut buf = Vec::with_capacity(32 * 5);
    push_u64(&mut buf, turn_num_record);
    push_u64(&mut buf, finalizes_at);
    buf.extend_from_slice(state_hash);
    push_address(&mut buf, challenger);
    buf.extend_from_slice(outcome_hash);
    keccak256(&buf)
}
