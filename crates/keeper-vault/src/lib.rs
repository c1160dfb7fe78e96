//! The local vault: an ordered sequence of named secrets, with deterministic
//! serialization, content hashing, and idempotent save semantics.

mod error;

pub use error::VaultError;

use keeper_secrets::Secret;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    description: String,
    secret: Secret,
}

struct Inner {
    entries: Vec<Entry>,
    /// Content hash of the bytes last returned by `save`/`reEncrypt`/`load`.
    remembered_hash: [u8; 32],
}

/// An in-memory, reader-writer-locked vault. Mutating operations take the
/// writer lock; reads take the reader lock.
pub struct Vault {
    inner: RwLock<Inner>,
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

impl Vault {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                remembered_hash: digest(&[]),
            }),
        }
    }

    /// Appends `(name, description, secret)` if `name` is not already
    /// present. Name equality for conflict detection is case-sensitive.
    /// No-op (with a warning) if the name is taken.
    pub async fn insert(&self, name: impl Into<String>, description: impl Into<String>, secret: Secret) {
        let name = name.into();
        let mut inner = self.inner.write().await;
        if inner.entries.iter().any(|e| e.name == name) {
            tracing::warn!(%name, "insert: name already present, skipping");
            return;
        }
        inner.entries.push(Entry { name, description: description.into(), secret });
    }

    /// Removes the first entry whose name equals `name` case-insensitively.
    /// No-op (with a warning) if absent.
    pub async fn delete(&self, name: &str) {
        let mut inner = self.inner.write().await;
        if let Some(pos) = inner.entries.iter().position(|e| e.name.eq_ignore_ascii_case(name)) {
            inner.entries.remove(pos);
        } else {
            tracing::warn!(%name, "delete: no such entry");
        }
    }

    /// Returns the matching secret, if any. Name match is case-insensitive.
    pub async fn get(&self, name: &str) -> Option<Secret> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.secret.clone())
    }

    /// Returns `name -> description` for every entry, omitting the
    /// empty-string name if present.
    pub async fn list(&self) -> HashMap<String, String> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|e| !e.name.is_empty())
            .map(|e| (e.name.clone(), e.description.clone()))
            .collect()
    }

    /// Canonically encodes the current sequence and computes its content
    /// hash. If the hash is unchanged since the last successful save,
    /// returns [`VaultError::HashUnchanged`] and performs no other work.
    pub async fn save(&self) -> Result<Vec<u8>, VaultError> {
        let mut inner = self.inner.write().await;
        let bytes = encode_entries(&inner.entries);
        let hash = digest(&bytes);
        if hash == inner.remembered_hash {
            tracing::info!("save: hash unchanged");
            return Err(VaultError::HashUnchanged);
        }
        inner.remembered_hash = hash;
        Ok(bytes)
    }

    /// Unconditional variant of `save`: always re-encodes and updates the
    /// remembered hash, even if the plaintext sequence has not changed.
    /// Used when the recipient key set changes but the content does not.
    pub async fn re_encrypt(&self) -> Vec<u8> {
        let mut inner = self.inner.write().await;
        let bytes = encode_entries(&inner.entries);
        inner.remembered_hash = digest(&bytes);
        bytes
    }

    /// Decodes `bytes` into a new sequence atomically. Empty bytes produce
    /// an empty vault. On decode failure the vault is left unchanged and
    /// the error is propagated.
    pub async fn load(&self, bytes: &[u8]) -> Result<(), VaultError> {
        let entries = decode_entries(bytes)?;
        let mut inner = self.inner.write().await;
        inner.entries = entries;
        inner.remembered_hash = digest(bytes);
        Ok(())
    }

    /// Returns the remembered content hash (hex-encoded SHA-256).
    pub async fn hash(&self) -> String {
        hex::encode(self.inner.read().await.remembered_hash)
    }
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn encode_entries(entries: &[Entry]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for entry in entries {
        push_field(&mut out, entry.name.as_bytes());
        push_field(&mut out, entry.description.as_bytes());
        push_field(&mut out, &entry.secret.encode());
    }
    out
}

fn decode_entries(bytes: &[u8]) -> Result<Vec<Entry>, keeper_secrets::DecodeError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut pos = 0usize;
    let count = read_u32(bytes, &mut pos)? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(bytes, &mut pos)?;
        let description = read_string(bytes, &mut pos)?;
        let secret_bytes = read_bytes(bytes, &mut pos)?;
        let secret = Secret::decode(&secret_bytes)?;
        entries.push(Entry { name, description, secret });
    }
    if pos != bytes.len() {
        return Err(keeper_secrets::DecodeError);
    }
    Ok(entries)
}

fn push_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32, keeper_secrets::DecodeError> {
    if bytes.len() - *pos < 4 {
        return Err(keeper_secrets::DecodeError);
    }
    let v = u32::from_be_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(v)
}

fn read_bytes(bytes: &[u8], pos: &mut usize) -> Result<Vec<u8>, keeper_secrets::DecodeError> {
    let len = read_u32(bytes, pos)? as usize;
    if bytes.len() - *pos < len {
        return Err(keeper_secrets::DecodeError);
    }
    let slice = bytes[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(slice)
}

fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String, keeper_secrets::DecodeError> {
    String::from_utf8(read_bytes(bytes, pos)?).map_err(|_| keeper_secrets::DecodeError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_is_case_sensitive_for_conflicts() {
        let v = Vault::new();
        v.insert("a", "first", Secret::free_text("1")).await;
        v.insert("A", "second", Secret::free_text("2")).await;
        assert_eq!(v.list().await.len(), 2);
    }

    #[tokio::test]
    async fn get_and_delete_are_case_insensitive() {
        let v = Vault::new();
        v.insert("Alpha", "d", Secret::free_text("x")).await;
        assert!(v.get("alpha").await.is_some());
        v.delete("ALPHA").await;
        assert!(v.get("alpha").await.is_none());
    }

    #[tokio::test]
    async fn list_omits_empty_name() {
        let v = Vault::new();
        v.insert("", "d", Secret::free_text("x")).await;
        v.insert("named", "d", Secret::free_text("y")).await;
        let list = v.list().await;
        assert_eq!(list.len(), 1);
        assert!(list.contains_key("named"));
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let v = Vault::new();
        v.insert("a", "d", Secret::free_text("x")).await;
        let b1 = v.save().await.expect("first save succeeds");
        assert!(matches!(v.save().await, Err(VaultError::HashUnchanged)));
        v.delete("a").await;
        let b2 = v.save().await.expect("save after mutation succeeds");
        assert_ne!(b1, b2);
    }

    #[tokio::test]
    async fn round_trip_preserves_order_and_hash() {
        let v = Vault::new();
        v.insert("a", "first", Secret::free_text("1")).await;
        v.insert("b", "second", Secret::credential_pair("bob", "pw")).await;
        let bytes = v.save().await.unwrap();

        let fresh = Vault::new();
        fresh.load(&bytes).await.unwrap();
        assert_eq!(fresh.list().await, v.list().await);
        assert_eq!(fresh.hash().await, hex::encode(digest(&bytes)));
    }

    #[tokio::test]
    async fn load_empty_bytes_yields_empty_vault() {
        let v = Vault::new();
        v.insert("a", "d", Secret::free_text("x")).await;
        v.load(&[]).await.unwrap();
        assert!(v.list().await.is_empty());
    }

    #[tokio::test]
    async fn load_failure_leaves_vault_unchanged() {
        let v = Vault::new();
        v.insert("a", "d", Secret::free_text("x")).await;
        let before = v.list().await;
        assert!(v.load(&[0xff, 0xff]).await.is_err());
        assert_eq!(v.list().await, before);
    }

    #[tokio::test]
    async fn re_encrypt_is_unconditional() {
        let v = Vault::new();
        v.insert("a", "d", Secret::free_text("x")).await;
        let _ = v.save().await.unwrap();
        // re_encrypt must succeed even with no intervening mutation.
        let bytes = v.re_encrypt().await;
        assert_eq!(v.hash().await, hex::encode(digest(&bytes)));
    }
}
