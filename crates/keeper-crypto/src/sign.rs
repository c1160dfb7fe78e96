//! Ed25519 signing, layered on top of the hybrid KEM so every sealed
//! envelope is both multi-recipient-readable and attributable to the
//! device that sealed it.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use crate::error::DecryptionError;

pub const SIGNING_PUBLIC_KEY_BYTES: usize = 32;
pub const SIGNATURE_BYTES: usize = 64;

pub struct SignKeypair {
    signing_key: SigningKey,
}

impl SignKeypair {
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::generate(&mut OsRng) }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(bytes) }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> [u8; SIGNING_PUBLIC_KEY_BYTES] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_BYTES] {
        self.signing_key.sign(message).to_bytes()
    }
}

pub fn verify(
    public_key: &[u8; SIGNING_PUBLIC_KEY_BYTES],
    message: &[u8],
    signature: &[u8; SIGNATURE_BYTES],
) -> Result<(), DecryptionError> {
    let vk = VerifyingKey::from_bytes(public_key).map_err(|_| DecryptionError)?;
    let sig = Signature::from_bytes(signature);
    vk.verify(message, &sig).map_err(|_| DecryptionError)
}
