//! AEAD: AES-256-GCM

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};

use crate::error::{DecryptionError, EncodingError};

/// Generate a random 12-byte nonce. Used during encryption only.
pub fn nonce() -> Result<[u8; 12], EncodingError> {
    let mut n = [0u8; 12];
    getrandom::getrandom(&mut n).map_err(|_| EncodingError)?;
    Ok(n)
}

pub fn aead_seal(key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncodingError)?;
    let n = Nonce::from_slice(nonce);
    cipher.encrypt(n, Payload { msg: plaintext, aad }).map_err(|_| EncodingError)
}

pub fn aead_open(key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| DecryptionError)?;
    let n = Nonce::from_slice(nonce);
    cipher.decrypt(n, Payload { msg: ciphertext, aad }).map_err(|_| DecryptionError)
}
