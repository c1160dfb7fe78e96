//! Hybrid post-quantum multi-recipient envelope.
//!
//! Every secret that leaves a device is sealed once and readable by every
//! trusted device on the account: a random data-encryption key seals the
//! body with AES-256-GCM, and that key is wrapped once per recipient using
//! a hybrid X25519 + ML-KEM-768 key encapsulation. The whole envelope is
//! signed with Ed25519 so an opener can attribute it to the sealing device
//! and reject anything from a device it doesn't trust.
//!
//! ```no_run
//! use keeper_crypto::{Identity, seal, open};
//!
//! let device_a = Identity::generate();
//! let device_b = Identity::generate();
//! let recipients = vec![device_a.public_key(), device_b.public_key()];
//! let trusted = recipients.clone();
//!
//! let ciphertext = seal(b"hunter2", &recipients, &device_a).unwrap();
//! let plaintext = open(&ciphertext, &device_b, &trusted).unwrap();
//! assert_eq!(plaintext, b"hunter2");
//! ```

mod aad;
mod aead;
mod armor;
mod envelope;
mod error;
mod kdf;
mod kem;
mod sign;
mod wire;

pub use armor::ArmorError;
pub use envelope::{open, seal, DevicePublicKey, Identity};
pub use error::{DecryptionError, EncodingError};
pub use kem::{KemProvider, PublicKey, SecretKey};
pub use wire::{KEM_PUBLIC_KEY_BYTES, KEM_SECRET_KEY_BYTES, PROTOCOL_VERSION};

/// Byte length of an [`Identity`]'s raw Ed25519 signing secret, for callers
/// (such as `keeper-keyring`) that persist identity halves separately.
pub const SIGN_SECRET_KEY_BYTES: usize = 32;

/// Armor an already-sealed envelope for transport as text.
pub fn armor_envelope(bytes: &[u8]) -> String {
    armor::armor("KEEPER MESSAGE", bytes)
}

/// Reverse of [`armor_envelope`].
pub fn dearmor_envelope(text: &str) -> Result<Vec<u8>, ArmorError> {
    armor::dearmor("KEEPER MESSAGE", text)
}

/// Armor arbitrary bytes under a caller-chosen label, for callers (such as
/// `keeper-keyring`) that need PGP-style framing around something other
/// than a sealed envelope or a device public key.
pub fn armor_with_label(label: &str, bytes: &[u8]) -> String {
    armor::armor(label, bytes)
}

/// Reverse of [`armor_with_label`].
pub fn dearmor_with_label(label: &str, text: &str) -> Result<Vec<u8>, ArmorError> {
    armor::dearmor(label, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armored_envelope_round_trips_through_text() {
        let a = Identity::generate();
        let b = Identity::generate();
        let recipients = vec![a.public_key(), b.public_key()];
        let ct = seal(b"payload", &recipients, &a).unwrap();

        let text = armor_envelope(&ct);
        assert!(text.starts_with("-----BEGIN KEEPER MESSAGE-----\n"));
        let recovered = dearmor_envelope(&text).unwrap();
        assert_eq!(recovered, ct);
        assert_eq!(open(&recovered, &b, &recipients).unwrap(), b"payload");
    }

    #[test]
    fn device_public_key_armors_and_fingerprints() {
        let id = Identity::generate();
        let pk = id.public_key();
        let text = pk.armor();
        let recovered = DevicePublicKey::dearmor(&text).unwrap();
        assert_eq!(pk.fingerprint(), recovered.fingerprint());
    }
}
