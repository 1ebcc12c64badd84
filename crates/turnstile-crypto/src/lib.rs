//! # turnstile-crypto
//!
//! Hashing, canonical encodings and signatures for the channel engine.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Channel ids, state hashes, storage hashes |
//! | `encode` | 32-byte-word ABI layout | Everything hashed against the chain |
//! | `ecdsa` | secp256k1 (recoverable) | State signing, signer recovery |
//!
//! The engine never compares raw structs against chain state, only hashes
//! produced by `encode`. Any divergence from the adjudicator's layout is a
//! fund-loss bug, so the layout lives in exactly one place.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod encode;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{recover_signer, ChannelKeyPair, StateSigner};
pub use encode::{app_part_hash, channel_id, channel_storage_hash, outcome_hash, state_hash};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_many, KeccakHasher};
