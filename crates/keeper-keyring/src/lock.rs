//! Passphrase-locked secret-key storage.
//!
//! file format: salt[16] || nonce[12] || ciphertext(+tag)
//!
//! The passphrase is run through Argon2id (64 MiB, 3 iterations, 1 lane) to
//! derive the AES-256-GCM key that wraps the raw private-key bytes.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::error::KeyringError;

const SALT_BYTES: usize = 16;
const NONCE_BYTES: usize = 12;
const LOCK_AAD: &[u8] = b"keeper|keyring|lock|v1";

fn derive_key(passphrase: &str, salt: &[u8; SALT_BYTES]) -> Result<Zeroizing<[u8; 32]>, KeyringError> {
    let params = Params::new(64 * 1024, 3, 1, Some(32)).map_err(|_| KeyringError::Storage)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut *key)
        .map_err(|_| KeyringError::Storage)?;
    Ok(key)
}

pub fn lock(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>, KeyringError> {
    let mut salt = [0u8; SALT_BYTES];
    getrandom::getrandom(&mut salt).map_err(|_| KeyringError::Storage)?;
    let key = derive_key(passphrase, &salt)?;

    let mut nonce = [0u8; NONCE_BYTES];
    getrandom::getrandom(&mut nonce).map_err(|_| KeyringError::Storage)?;

    let cipher = Aes256Gcm::new_from_slice(&*key).map_err(|_| KeyringError::Storage)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: LOCK_AAD })
        .map_err(|_| KeyringError::Storage)?;

    let mut out = Vec::with_capacity(SALT_BYTES + NONCE_BYTES + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn unlock(locked: &[u8], passphrase: &str) -> Result<Vec<u8>, KeyringError> {
    if locked.len() < SALT_BYTES + NONCE_BYTES {
        return Err(KeyringError::KeyLocked);
    }
    let salt: [u8; SALT_BYTES] = locked[..SALT_BYTES].try_into().unwrap();
    let nonce: [u8; NONCE_BYTES] = locked[SALT_BYTES..SALT_BYTES + NONCE_BYTES].try_into().unwrap();
    let ciphertext = &locked[SALT_BYTES + NONCE_BYTES..];

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&*key).map_err(|_| KeyringError::KeyLocked)?;
    cipher
        .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad: LOCK_AAD })
        .map_err(|_| KeyringError::KeyLocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_unlock_round_trips() {
        let locked = lock(b"top secret key material", "correct horse").unwrap();
        assert_eq!(unlock(&locked, "correct horse").unwrap(), b"top secret key material");
    }

    #[test]
    fn unlock_fails_with_wrong_passphrase() {
        let locked = lock(b"material", "right").unwrap();
        assert!(unlock(&locked, "wrong").is_err());
    }
}
