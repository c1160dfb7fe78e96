//! Local on-disk layout for a device's keyring.
//!
//! ```text
//! <dir>/
//!   device_id          deterministic local device identifier (hex, generated once)
//!   {device_id}.sk      passphrase-locked secret key (kem secret || sign secret)
//!   {device_id}.pub     armored own public key
//!   *.pub               any other armored public keys dropped into the directory
//! ```
//!
//! Writes are atomic: write to a `.tmp` sibling, then rename, matching the
//! teacher's `FileBackend::put` discipline.

use std::fs;
use std::path::{Path, PathBuf};

use keeper_crypto::{DevicePublicKey, Identity, KEM_PUBLIC_KEY_BYTES, KEM_SECRET_KEY_BYTES, SIGN_SECRET_KEY_BYTES};

use crate::error::KeyringError;
use crate::lock;

pub struct LocalKeyStore {
    dir: PathBuf,
}

impl LocalKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, KeyringError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<(), KeyringError> {
        let path = self.dir.join(name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Look up the deterministic local device identifier, generating and
    /// persisting one on first use.
    pub fn device_id(&self) -> Result<String, KeyringError> {
        let path = self.dir.join("device_id");
        if let Ok(existing) = fs::read_to_string(&path) {
            let trimmed = existing.trim().to_string();
            if !trimmed.is_empty() {
                return Ok(trimmed);
            }
        }
        let mut raw = [0u8; 16];
        getrandom::getrandom(&mut raw).map_err(|_| KeyringError::Storage)?;
        let id = hex::encode(raw);
        self.write_atomic("device_id", id.as_bytes())?;
        Ok(id)
    }

    fn sk_path(&self, device_id: &str) -> PathBuf {
        self.dir.join(format!("{device_id}.sk"))
    }

    fn pub_path(&self, device_id: &str) -> PathBuf {
        self.dir.join(format!("{device_id}.pub"))
    }

    /// Load this device's own identity, if a key pair has already been
    /// generated for `device_id`. Returns `Ok(None)` if none exists yet.
    pub fn load_own_identity(&self, device_id: &str, passphrase: &str) -> Result<Option<Identity>, KeyringError> {
        let sk_path = self.sk_path(device_id);
        if !sk_path.exists() {
            return Ok(None);
        }
        let locked = fs::read(&sk_path)?;
        let unlocked = lock::unlock(&locked, passphrase)?;
        if unlocked.len() != KEM_SECRET_KEY_BYTES + SIGN_SECRET_KEY_BYTES {
            return Err(KeyringError::Storage);
        }
        let (kem_secret_bytes, sign_secret_bytes) = unlocked.split_at(KEM_SECRET_KEY_BYTES);
        let sign_secret: [u8; SIGN_SECRET_KEY_BYTES] = sign_secret_bytes.try_into().map_err(|_| KeyringError::Storage)?;

        let armored_pub = fs::read_to_string(self.pub_path(device_id))?;
        let pub_key = DevicePublicKey::dearmor(&armored_pub).map_err(|_| KeyringError::KeyParse)?;

        Ok(Some(Identity::restore(&pub_key.to_bytes()[..KEM_PUBLIC_KEY_BYTES], kem_secret_bytes, &sign_secret)?))
    }

    /// Generate a fresh identity for `device_id`, lock it with `passphrase`,
    /// and persist both halves.
    pub fn generate_own_identity(&self, device_id: &str, passphrase: &str) -> Result<Identity, KeyringError> {
        let identity = Identity::generate();
        self.save_own_identity(device_id, &identity, passphrase)?;
        Ok(identity)
    }

    pub fn save_own_identity(&self, device_id: &str, identity: &Identity, passphrase: &str) -> Result<(), KeyringError> {
        let mut secret_bytes = identity.kem_secret_bytes();
        secret_bytes.extend_from_slice(&identity.sign_secret_bytes());
        let locked = lock::lock(&secret_bytes, passphrase)?;
        self.write_atomic(&format!("{device_id}.sk"), &locked)?;
        self.write_atomic(&format!("{device_id}.pub"), identity.public_key().armor().as_bytes())?;
        Ok(())
    }

    /// Load every armored public key dropped into the directory, including
    /// this device's own.
    pub fn load_trusted_public_keys(&self) -> Result<Vec<DevicePublicKey>, KeyringError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pub") {
                continue;
            }
            let armored = fs::read_to_string(&path)?;
            if let Ok(key) = DevicePublicKey::dearmor(&armored) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Write an additional trusted public key into the directory under a
    /// content-addressed filename, so repeated adds of the same key collapse.
    pub fn persist_public_key(&self, key: &DevicePublicKey) -> Result<(), KeyringError> {
        let fingerprint = hex::encode(key.fingerprint());
        self.write_atomic(&format!("peer-{fingerprint}.pub"), key.armor().as_bytes())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_is_generated_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalKeyStore::new(dir.path()).unwrap();
        let first = store.device_id().unwrap();
        let second = store.device_id().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn own_identity_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalKeyStore::new(dir.path()).unwrap();
        let device_id = store.device_id().unwrap();

        let generated = store.generate_own_identity(&device_id, "hunter2").unwrap();
        let expected_fingerprint = generated.public_key().fingerprint();

        let loaded = store.load_own_identity(&device_id, "hunter2").unwrap().unwrap();
        assert_eq!(loaded.public_key().fingerprint(), expected_fingerprint);
    }

    #[test]
    fn load_own_identity_fails_with_wrong_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalKeyStore::new(dir.path()).unwrap();
        let device_id = store.device_id().unwrap();
        store.generate_own_identity(&device_id, "right").unwrap();

        assert!(store.load_own_identity(&device_id, "wrong").is_err());
    }

    #[test]
    fn persisted_public_keys_are_discoverable() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalKeyStore::new(dir.path()).unwrap();
        let other = keeper_crypto::Identity::generate().public_key();
        store.persist_public_key(&other).unwrap();

        let found = store.load_trusted_public_keys().unwrap();
        assert!(found.iter().any(|k| k.fingerprint() == other.fingerprint()));
    }
}
