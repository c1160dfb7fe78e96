//! Multi-recipient envelope wire format.
//!
//! ```text
//! header:
//!   version[1] || suite_kem[1] || suite_aead[1] || flags[1]
//!   || recipient_count[2 BE] || signer_pubkey[32]
//!
//! recipient entry (one per trusted key, repeated recipient_count times):
//!   fingerprint[32] || kem_ciphertext[1120] || wrap_nonce[12] || wrapped_dek[48]
//!
//! body:
//!   body_nonce[12] || body_ct_len[4 BE] || body_ciphertext[16+]
//!
//! signature:
//!   signature[64]   (Ed25519 over everything preceding it)
//! ```
//!
//! `kem_ciphertext = x25519_ephemeral_pk[32] || mlkem768_ciphertext[1088]`.
//! `wrapped_dek` is the 32-byte data-encryption key sealed with AES-256-GCM
//! under a key derived (via the same KDF used for the body) from that
//! recipient's hybrid shared secret.

use crate::error::DecryptionError;

pub const PROTOCOL_ID: &[u8] = b"keeper-crypto-v1";
pub const PROTOCOL_VERSION: u8 = 0x01;

pub const SUITE_KEM_HYBRID_X25519_MLKEM768: u8 = 0xA3;
pub const SUITE_AEAD_AES256GCM: u8 = 0xB1;
pub const FLAGS_V1: u8 = 0x00;

pub const X25519_KEY_BYTES: usize = 32;
pub const MLKEM_CIPHERTEXT_BYTES: usize = 1088;
pub const MLKEM_PUBLIC_KEY_BYTES: usize = 1184;
pub const MLKEM_SECRET_KEY_BYTES: usize = 2400;

pub const KEM_CIPHERTEXT_BYTES: usize = X25519_KEY_BYTES + MLKEM_CIPHERTEXT_BYTES; // 1120
pub const KEM_PUBLIC_KEY_BYTES: usize = X25519_KEY_BYTES + MLKEM_PUBLIC_KEY_BYTES; // 1216
pub const KEM_SECRET_KEY_BYTES: usize = X25519_KEY_BYTES + MLKEM_SECRET_KEY_BYTES; // 2432
pub const SHARED_SECRET_BYTES: usize = 32;

pub const NONCE_BYTES: usize = 12;
pub const AEAD_TAG_BYTES: usize = 16;

pub const FINGERPRINT_BYTES: usize = 32;
pub const DEK_BYTES: usize = 32;
pub const WRAPPED_DEK_BYTES: usize = DEK_BYTES + AEAD_TAG_BYTES; // 48
pub const RECIPIENT_ENTRY_BYTES: usize = FINGERPRINT_BYTES + KEM_CIPHERTEXT_BYTES + NONCE_BYTES + WRAPPED_DEK_BYTES; // 1212

pub const SIGNER_PUBKEY_BYTES: usize = 32;
pub const MSG_ID_BYTES: usize = 16;
pub const HEADER_BYTES: usize = 1 + 1 + 1 + 1 + 2 + SIGNER_PUBKEY_BYTES + 8 + MSG_ID_BYTES; // 62
pub const SIGNATURE_BYTES: usize = 64;

pub struct Header {
    pub version: u8,
    pub recipient_count: u16,
    pub signer_pubkey: [u8; SIGNER_PUBKEY_BYTES],
    pub ts_unix_ms: u64,
    pub msg_id: [u8; MSG_ID_BYTES],
}

pub fn encode_header(
    recipient_count: u16,
    signer_pubkey: &[u8; SIGNER_PUBKEY_BYTES],
    ts_unix_ms: u64,
    msg_id: &[u8; MSG_ID_BYTES],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_BYTES);
    out.push(PROTOCOL_VERSION);
    out.push(SUITE_KEM_HYBRID_X25519_MLKEM768);
    out.push(SUITE_AEAD_AES256GCM);
    out.push(FLAGS_V1);
    out.extend_from_slice(&recipient_count.to_be_bytes());
    out.extend_from_slice(signer_pubkey);
    out.extend_from_slice(&ts_unix_ms.to_be_bytes());
    out.extend_from_slice(msg_id);
    out
}

pub fn decode_header(data: &[u8]) -> Result<Header, DecryptionError> {
    if data.len() < HEADER_BYTES {
        return Err(DecryptionError);
    }
    let version = data[0];
    let suite_kem = data[1];
    let suite_aead = data[2];
    let flags = data[3];
    if version != PROTOCOL_VERSION
        || suite_kem != SUITE_KEM_HYBRID_X25519_MLKEM768
        || suite_aead != SUITE_AEAD_AES256GCM
        || flags != FLAGS_V1
    {
        return Err(DecryptionError);
    }
    let recipient_count = u16::from_be_bytes([data[4], data[5]]);
    let mut pos = 6;
    let signer_pubkey: [u8; SIGNER_PUBKEY_BYTES] =
        data[pos..pos + SIGNER_PUBKEY_BYTES].try_into().map_err(|_| DecryptionError)?;
    pos += SIGNER_PUBKEY_BYTES;
    let ts_unix_ms = u64::from_be_bytes(data[pos..pos + 8].try_into().map_err(|_| DecryptionError)?);
    pos += 8;
    let msg_id: [u8; MSG_ID_BYTES] = data[pos..pos + MSG_ID_BYTES].try_into().map_err(|_| DecryptionError)?;
    Ok(Header { version, recipient_count, signer_pubkey, ts_unix_ms, msg_id })
}

pub struct RecipientEntry {
    pub fingerprint: [u8; FINGERPRINT_BYTES],
    pub kem_ciphertext: Vec<u8>,
    pub wrap_nonce: [u8; NONCE_BYTES],
    pub wrapped_dek: Vec<u8>,
}

pub fn encode_recipient_entry(
    fingerprint: &[u8; FINGERPRINT_BYTES],
    kem_ciphertext: &[u8],
    wrap_nonce: &[u8; NONCE_BYTES],
    wrapped_dek: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECIPIENT_ENTRY_BYTES);
    out.extend_from_slice(fingerprint);
    out.extend_from_slice(kem_ciphertext);
    out.extend_from_slice(wrap_nonce);
    out.extend_from_slice(wrapped_dek);
    out
}

pub fn decode_recipient_entry(data: &[u8]) -> Result<RecipientEntry, DecryptionError> {
    if data.len() < RECIPIENT_ENTRY_BYTES {
        return Err(DecryptionError);
    }
    let mut pos = 0;
    let fingerprint: [u8; FINGERPRINT_BYTES] = data[pos..pos + FINGERPRINT_BYTES].try_into().unwrap();
    pos += FINGERPRINT_BYTES;
    let kem_ciphertext = data[pos..pos + KEM_CIPHERTEXT_BYTES].to_vec();
    pos += KEM_CIPHERTEXT_BYTES;
    let wrap_nonce: [u8; NONCE_BYTES] = data[pos..pos + NONCE_BYTES].try_into().unwrap();
    pos += NONCE_BYTES;
    let wrapped_dek = data[pos..pos + WRAPPED_DEK_BYTES].to_vec();
    Ok(RecipientEntry { fingerprint, kem_ciphertext, wrap_nonce, wrapped_dek })
}
