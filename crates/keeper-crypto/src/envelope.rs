//! Multi-recipient envelope: seal plaintext once so every trusted device
//! can open it, and sign the result so openers can tell who sealed it.
//!
//! Construction: a random data-encryption key (DEK) seals the plaintext
//! once with AES-256-GCM; the DEK is then wrapped once per recipient using
//! the hybrid KEM's existing single-recipient encapsulate/decapsulate as
//! the wrap primitive. The whole message (header + recipient table + body)
//! is Ed25519-signed by the sealing device.

use sha2::{Digest, Sha256};

use crate::aad;
use crate::aead;
use crate::error::{DecryptionError, EncodingError};
use crate::kdf;
use crate::kem::{HybridX25519MlKem768Provider, KemProvider, PublicKey as KemPublicKey, SecretKey as KemSecretKey};
use crate::sign::{self, SignKeypair};
use crate::wire;

const WRAP_CONTEXT: &[u8] = b"keeper|ctx|v1|prod|wrap";
const BODY_ROUTE: &str = "vault";

/// A device's public half: a KEM public key plus an Ed25519 verifying key,
/// serialized and compared as one unit.
#[derive(Clone)]
pub struct DevicePublicKey {
    kem: KemPublicKey,
    sign_pubkey: [u8; sign::SIGNING_PUBLIC_KEY_BYTES],
}

impl DevicePublicKey {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.kem.to_bytes().to_vec();
        out.extend_from_slice(&self.sign_pubkey);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecryptionError> {
        if bytes.len() != wire::KEM_PUBLIC_KEY_BYTES + sign::SIGNING_PUBLIC_KEY_BYTES {
            return Err(DecryptionError);
        }
        let kem = KemPublicKey::from_bytes(&bytes[..wire::KEM_PUBLIC_KEY_BYTES])?;
        let sign_pubkey: [u8; sign::SIGNING_PUBLIC_KEY_BYTES] =
            bytes[wire::KEM_PUBLIC_KEY_BYTES..].try_into().map_err(|_| DecryptionError)?;
        Ok(Self { kem, sign_pubkey })
    }

    pub fn armor(&self) -> String {
        crate::armor::armor("KEEPER PUBLIC KEY", &self.to_bytes())
    }

    pub fn dearmor(text: &str) -> Result<Self, DecryptionError> {
        let bytes = crate::armor::dearmor("KEEPER PUBLIC KEY", text).map_err(|_| DecryptionError)?;
        Self::from_bytes(&bytes)
    }

    /// SHA-256 of the serialized public key, used to address recipient
    /// wrap-entries without re-deriving shared secrets for every key.
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.to_bytes()).into()
    }
}

impl PartialEq for DevicePublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}
impl Eq for DevicePublicKey {}

/// One device's full identity: KEM keypair + signing keypair.
pub struct Identity {
    kem_public: KemPublicKey,
    kem_secret: KemSecretKey,
    sign: SignKeypair,
}

impl Identity {
    pub fn generate() -> Self {
        let (kem_public, kem_secret) = HybridX25519MlKem768Provider::keygen();
        Self { kem_public, kem_secret, sign: SignKeypair::generate() }
    }

    /// Restore a full identity from its previously-persisted public and
    /// secret halves (the normal bootstrap path).
    pub fn restore(kem_public_bytes: &[u8], kem_secret_bytes: &[u8], sign_secret_bytes: &[u8; 32]) -> Result<Self, DecryptionError> {
        Ok(Self {
            kem_public: KemPublicKey::from_bytes(kem_public_bytes)?,
            kem_secret: KemSecretKey::from_bytes(kem_secret_bytes)?,
            sign: SignKeypair::from_bytes(sign_secret_bytes),
        })
    }

    pub fn public_key(&self) -> DevicePublicKey {
        DevicePublicKey { kem: self.kem_public.clone(), sign_pubkey: self.sign.public_key() }
    }

    pub fn kem_public_bytes(&self) -> Vec<u8> {
        self.kem_public.to_bytes().to_vec()
    }

    pub fn kem_secret_bytes(&self) -> Vec<u8> {
        self.kem_secret.to_bytes().to_vec()
    }

    pub fn sign_secret_bytes(&self) -> [u8; 32] {
        self.sign.to_bytes()
    }
}

/// Seal `plaintext` so every key in `recipients` can open it. Fails if
/// `recipients` is empty.
pub fn seal(plaintext: &[u8], recipients: &[DevicePublicKey], signer: &Identity) -> Result<Vec<u8>, EncodingError> {
    if recipients.is_empty() {
        return Err(EncodingError);
    }
    if recipients.len() > u16::MAX as usize {
        return Err(EncodingError);
    }

    let mut dek = [0u8; wire::DEK_BYTES];
    getrandom::getrandom(&mut dek).map_err(|_| EncodingError)?;

    let ts_unix_ms = now_unix_ms();
    let msg_id = aad::generate_msg_id()?;
    let signer_pubkey = signer.sign.public_key();

    let mut out = wire::encode_header(recipients.len() as u16, &signer_pubkey, ts_unix_ms, &msg_id);

    for recipient in recipients {
        let (shared_secret, kem_ct) = HybridX25519MlKem768Provider::encapsulate(&recipient.kem)?;
        let ct_hash = kdf::ct_hash(&kem_ct);
        let wrap_key = kdf::derive_key(&shared_secret, &ct_hash, WRAP_CONTEXT)?;
        let wrap_nonce = aead::nonce()?;
        let fingerprint = recipient.fingerprint();
        let wrapped_dek = aead::aead_seal(&wrap_key, &wrap_nonce, &dek, &fingerprint)?;
        out.extend_from_slice(&wire::encode_recipient_entry(&fingerprint, &kem_ct, &wrap_nonce, &wrapped_dek));
    }

    let sender_id = hex::encode(signer_pubkey);
    let aad_bytes = aad::build_aad(&sender_id, "multi", BODY_ROUTE, ts_unix_ms, 0, msg_id)?;

    let body_nonce = aead::nonce()?;
    let body_ct = aead::aead_seal(&dek, &body_nonce, plaintext, &aad_bytes)?;

    out.extend_from_slice(&body_nonce);
    out.extend_from_slice(&(body_ct.len() as u32).to_be_bytes());
    out.extend_from_slice(&body_ct);

    let signature = signer.sign.sign(&out);
    out.extend_from_slice(&signature);

    Ok(out)
}

/// Open `ciphertext` with `my_identity`'s secret key, verifying the
/// signature against `trusted_signers`. Fails unless the decrypting
/// identity holds a recipient slot AND the sealing device's public key is
/// present in `trusted_signers`.
pub fn open(ciphertext: &[u8], my_identity: &Identity, trusted_signers: &[DevicePublicKey]) -> Result<Vec<u8>, DecryptionError> {
    if ciphertext.len() < wire::SIGNATURE_BYTES {
        return Err(DecryptionError);
    }
    let (message, signature_bytes) = ciphertext.split_at(ciphertext.len() - wire::SIGNATURE_BYTES);
    let signature: [u8; wire::SIGNATURE_BYTES] = signature_bytes.try_into().map_err(|_| DecryptionError)?;

    let header = wire::decode_header(message)?;

    let signer_trusted = trusted_signers.iter().any(|k| k.sign_pubkey == header.signer_pubkey);
    if !signer_trusted {
        return Err(DecryptionError);
    }
    sign::verify(&header.signer_pubkey, message, &signature)?;

    let mut pos = wire::HEADER_BYTES;
    let my_fingerprint = my_identity.public_key().fingerprint();
    let mut found_dek: Option<[u8; wire::DEK_BYTES]> = None;

    for _ in 0..header.recipient_count {
        if message.len() < pos + wire::RECIPIENT_ENTRY_BYTES {
            return Err(DecryptionError);
        }
        let entry = wire::decode_recipient_entry(&message[pos..pos + wire::RECIPIENT_ENTRY_BYTES])?;
        pos += wire::RECIPIENT_ENTRY_BYTES;

        if found_dek.is_some() || entry.fingerprint != my_fingerprint {
            continue;
        }

        let shared_secret = HybridX25519MlKem768Provider::decapsulate(&my_identity.kem_secret, &entry.kem_ciphertext)?;
        let ct_hash = kdf::ct_hash(&entry.kem_ciphertext);
        let wrap_key = kdf::derive_key(&shared_secret, &ct_hash, WRAP_CONTEXT).map_err(|_| DecryptionError)?;
        let dek_bytes = aead::aead_open(&wrap_key, &entry.wrap_nonce, &entry.wrapped_dek, &entry.fingerprint)?;
        let dek: [u8; wire::DEK_BYTES] = dek_bytes.try_into().map_err(|_| DecryptionError)?;
        found_dek = Some(dek);
    }

    let dek = found_dek.ok_or(DecryptionError)?;

    if message.len() < pos + wire::NONCE_BYTES + 4 {
        return Err(DecryptionError);
    }
    let body_nonce: [u8; wire::NONCE_BYTES] = message[pos..pos + wire::NONCE_BYTES].try_into().unwrap();
    pos += wire::NONCE_BYTES;
    let body_len = u32::from_be_bytes(message[pos..pos + 4].try_into().unwrap()) as usize;
    pos += 4;
    if message.len() != pos + body_len {
        return Err(DecryptionError);
    }
    let body_ct = &message[pos..pos + body_len];

    let sender_id = hex::encode(header.signer_pubkey);
    let aad_bytes = aad::build_aad(&sender_id, "multi", BODY_ROUTE, header.ts_unix_ms, 0, header.msg_id)
        .map_err(|_| DecryptionError)?;

    aead::aead_open(&dek, &body_nonce, body_ct, &aad_bytes)
}

fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip_for_every_recipient() {
        let a = Identity::generate();
        let b = Identity::generate();
        let c = Identity::generate();
        let recipients = vec![a.public_key(), b.public_key(), c.public_key()];
        let signers = recipients.clone();

        let ct = seal(b"top secret", &recipients, &a).unwrap();

        assert_eq!(open(&ct, &a, &signers).unwrap(), b"top secret");
        assert_eq!(open(&ct, &b, &signers).unwrap(), b"top secret");
        assert_eq!(open(&ct, &c, &signers).unwrap(), b"top secret");
    }

    #[test]
    fn open_fails_for_non_recipient() {
        let a = Identity::generate();
        let b = Identity::generate();
        let outsider = Identity::generate();
        let recipients = vec![a.public_key(), b.public_key()];
        let signers = recipients.clone();

        let ct = seal(b"hello", &recipients, &a).unwrap();
        assert!(open(&ct, &outsider, &signers).is_err());
    }

    #[test]
    fn open_fails_when_signer_not_trusted() {
        let a = Identity::generate();
        let b = Identity::generate();
        let recipients = vec![a.public_key(), b.public_key()];

        let ct = seal(b"hello", &recipients, &a).unwrap();
        // b doesn't trust a's signing key
        assert!(open(&ct, &b, &[b.public_key()]).is_err());
    }

    #[test]
    fn seal_fails_with_no_recipients() {
        let a = Identity::generate();
        assert!(seal(b"hello", &[], &a).is_err());
    }

    #[test]
    fn revocation_seals_vault_against_removed_key() {
        let a = Identity::generate();
        let b = Identity::generate();
        let recipients_before = vec![a.public_key(), b.public_key()];
        let signers = recipients_before.clone();
        let ct_before = seal(b"v1", &recipients_before, &a).unwrap();
        assert!(open(&ct_before, &b, &signers).is_ok());

        // b revoked: re-encrypt to the remaining set only.
        let recipients_after = vec![a.public_key()];
        let ct_after = seal(b"v2", &recipients_after, &a).unwrap();
        assert!(open(&ct_after, &b, &signers).is_err());
        assert!(open(&ct_after, &a, &signers).is_ok());
    }
}
