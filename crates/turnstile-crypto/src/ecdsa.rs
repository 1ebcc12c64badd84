//! # Recoverable ECDSA (secp256k1)
//!
//! Channel states are signed over their Keccak-256 hash with recoverable
//! secp256k1 signatures, so the signer's address can be recovered from the
//! wire without shipping public keys.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Secret key material zeroized on drop

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use turnstile_types::{Address, Hash, Signature};
use zeroize::Zeroize;

use crate::errors::CryptoError;
use crate::hashing::keccak256;

/// A signing oracle: `sign(hash) -> signature` plus the signer's address.
///
/// Key custody is out of scope; anything that can produce a recoverable
/// signature over a 32-byte hash can stand behind this trait.
pub trait StateSigner: Send + Sync {
    /// Sign a 32-byte hash, returning a 65-byte r || s || v signature.
    fn sign(&self, hash: &Hash) -> Signature;

    /// The address recoverable from this signer's signatures.
    fn address(&self) -> Address;
}

/// secp256k1 keypair holding the key material in-process.
pub struct ChannelKeyPair {
    signing_key: SigningKey,
}

impl ChannelKeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl StateSigner for ChannelKeyPair {
    /// Sign a hash (deterministic RFC 6979), producing r || s || v with the
    /// Ethereum-style recovery byte (27 or 28).
    fn sign(&self, hash: &Hash) -> Signature {
        // SAFETY: signing a 32-byte prehash with a valid key cannot fail
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .expect("prehash signing is infallible for a valid key");

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        bytes
    }

    fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }
}

impl Drop for ChannelKeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Recover the signer address of a 65-byte signature over `hash`.
pub fn recover_signer(hash: &Hash, signature: &Signature) -> Result<Address, CryptoError> {
    let sig = EcdsaSignature::from_slice(&signature[..64])
        .map_err(|_| CryptoError::InvalidSignature)?;

    let v = signature[64];
    let recovery_byte = v.checked_sub(27).ok_or(CryptoError::InvalidSignature)?;
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(CryptoError::InvalidSignature)?;

    let verifying_key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_of(&verifying_key))
}

/// Ethereum-style address: last 20 bytes of keccak256(uncompressed pubkey).
fn address_of(verifying_key: &VerifyingKey) -> Address {
    let encoded = verifying_key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let digest = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_roundtrips() {
        let keypair = ChannelKeyPair::generate();
        let hash = keccak256(b"some state hash");

        let signature = keypair.sign(&hash);
        let recovered = recover_signer(&hash, &signature).unwrap();

        assert_eq!(recovered, keypair.address());
    }

    #[test]
    fn recovery_over_wrong_hash_gives_wrong_address() {
        let keypair = ChannelKeyPair::generate();
        let signature = keypair.sign(&keccak256(b"hash one"));

        let recovered = recover_signer(&keccak256(b"hash two"), &signature).unwrap();
        assert_ne!(recovered, keypair.address());
    }

    #[test]
    fn deterministic_signatures() {
        let keypair = ChannelKeyPair::from_bytes([0xABu8; 32]).unwrap();
        let hash = keccak256(b"deterministic test");

        assert_eq!(keypair.sign(&hash)[..], keypair.sign(&hash)[..]);
    }

    #[test]
    fn garbage_recovery_byte_is_rejected() {
        let keypair = ChannelKeyPair::generate();
        let hash = keccak256(b"state");
        let mut signature = keypair.sign(&hash);
        signature[64] = 5;

        assert!(recover_signer(&hash, &signature).is_err());
    }

    #[test]
    fn roundtrip_bytes() {
        let original = ChannelKeyPair::generate();
        let restored = ChannelKeyPair::from_bytes(original.to_bytes()).unwrap();
        assert_eq!(original.address(), restored.address());
    }
}
