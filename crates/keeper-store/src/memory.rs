//! In-memory `StorageBackend`, adapted from the teacher's
//! `InMemoryBackend` (a single lock guarding a handful of maps) and
//! extended to the four related tables this store needs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::types::{ActionLogEntry, PgpKey, VaultVersion};

struct VersionRow {
    username: String,
    hash: String,
    ciphertext: String,
    timestamp: i64,
}

struct PgpRow {
    username: String,
    armored: String,
    confirmed: bool,
    revoked: bool,
    timestamp: i64,
}

struct LogRow {
    username: String,
    timestamp: i64,
    action: String,
    detail: Option<String>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, String>,
    versions: Vec<VersionRow>,
    pgp: Vec<PgpRow>,
    log: Vec<LogRow>,
}

impl Inner {
    fn append_log(&mut self, username: &str, action: &str, detail: Option<String>) {
        self.log.push(LogRow { username: username.to_string(), timestamp: now_ms(), action: action.to_string(), detail });
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Ephemeral store; every table lives behind one lock, matching the
/// teacher's `InMemoryBackend` shape. Intended for tests and local dev.
pub struct InMemoryBackend {
    inner: RwLock<Inner>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn sign_up(&self, username: &str, password: &str, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(username) {
            return Err(StoreError::UserExists);
        }
        let hash = keeper_auth::hash_password(password).map_err(|_| StoreError::Storage)?;
        inner.users.insert(username.to_string(), hash);
        inner.append_log(username, "signup", None);
        Ok(())
    }

    async fn sign_in(&self, username: &str, password: &str, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let hash = inner.users.get(username).cloned().ok_or(StoreError::BadCredentials)?;
        keeper_auth::verify_password(password, &hash).map_err(|_| StoreError::BadCredentials)?;
        inner.append_log(username, "signin", None);
        Ok(())
    }

    async fn delete_user(&self, username: &str, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(username).is_none() {
            return Err(StoreError::NoSuchUser);
        }
        inner.versions.retain(|v| v.username != username);
        inner.pgp.retain(|k| k.username != username);
        Ok(())
    }

    async fn push(&self, username: &str, hash: &str, ciphertext: &str, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let duplicate = inner
            .versions
            .iter()
            .any(|v| v.username == username && v.hash == hash && v.ciphertext == ciphertext);
        if duplicate {
            return Err(StoreError::DuplicateVersion);
        }
        let timestamp = now_ms();
        inner.versions.push(VersionRow {
            username: username.to_string(),
            hash: hash.to_string(),
            ciphertext: ciphertext.to_string(),
            timestamp,
        });
        inner.append_log(username, "push", Some(hash.to_string()));
        Ok(())
    }

    async fn pull(&self, username: &str, hash: &str, _ip: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        let newest = inner
            .versions
            .iter()
            .filter(|v| v.username == username && v.hash == hash)
            .max_by_key(|v| v.timestamp)
            .map(|v| v.ciphertext.clone());
        let ciphertext = newest.ok_or(StoreError::NoContent)?;
        inner.append_log(username, "pull", None);
        Ok(ciphertext)
    }

    async fn versions(&self, username: &str, _ip: &str) -> Result<Vec<VaultVersion>, StoreError> {
        let mut inner = self.inner.write().await;
        let rows: Vec<VaultVersion> = inner
            .versions
            .iter()
            .filter(|v| v.username == username)
            .map(|v| VaultVersion { timestamp: v.timestamp, hash: v.hash.clone() })
            .collect();
        if rows.is_empty() {
            return Err(StoreError::NoContent);
        }
        inner.append_log(username, "get versions", None);
        Ok(rows)
    }

    async fn list_active_pgp(&self, username: &str, _ip: &str) -> Result<Vec<PgpKey>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .pgp
            .iter()
            .filter(|k| k.username == username && !k.revoked)
            .map(|k| PgpKey { timestamp: k.timestamp, armored: k.armored.clone(), confirmed: k.confirmed })
            .collect())
    }

    async fn add_pgp(&self, username: &str, armored: &str, confirmed: bool, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.pgp.iter().any(|k| k.username == username && k.armored == armored) {
            return Ok(());
        }
        inner.pgp.push(PgpRow {
            username: username.to_string(),
            armored: armored.to_string(),
            confirmed,
            revoked: false,
            timestamp: now_ms(),
        });
        Ok(())
    }

    async fn confirm_pgp(&self, username: &str, armored: &str, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let row = inner
            .pgp
            .iter_mut()
            .find(|k| k.username == username && k.armored == armored)
            .ok_or(StoreError::NoSuchKey)?;
        row.confirmed = true;
        Ok(())
    }

    async fn revoke_pgp(&self, username: &str, armored: &str, _ip: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let row = inner
            .pgp
            .iter_mut()
            .find(|k| k.username == username && k.armored == armored)
            .ok_or(StoreError::NoSuchKey)?;
        row.revoked = true;
        Ok(())
    }

    async fn get_log(&self, username: &str, _ip: &str) -> Result<Vec<ActionLogEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<ActionLogEntry> = inner
            .log
            .iter()
            .filter(|l| l.username == username)
            .map(|l| ActionLogEntry { timestamp: l.timestamp, action: l.action.clone(), detail: l.detail.clone() })
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signup_then_duplicate_fails() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        assert_eq!(store.sign_up("alice", "other", "127.0.0.1").await.unwrap_err(), StoreError::UserExists);
    }

    #[tokio::test]
    async fn signin_does_not_distinguish_wrong_user_from_wrong_password() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        let wrong_user = store.sign_in("bob", "hunter2", "127.0.0.1").await.unwrap_err();
        let wrong_pass = store.sign_in("alice", "wrong", "127.0.0.1").await.unwrap_err();
        assert_eq!(wrong_user, StoreError::BadCredentials);
        assert_eq!(wrong_pass, StoreError::BadCredentials);
    }

    #[tokio::test]
    async fn push_pull_round_trips_and_dedups() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        store.push("alice", "h1", "ct1", "127.0.0.1").await.unwrap();
        assert_eq!(store.pull("alice", "h1", "127.0.0.1").await.unwrap(), "ct1");
        assert_eq!(store.push("alice", "h1", "ct1", "127.0.0.1").await.unwrap_err(), StoreError::DuplicateVersion);
    }

    #[tokio::test]
    async fn pull_missing_hash_is_no_content() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        assert_eq!(store.pull("alice", "missing", "127.0.0.1").await.unwrap_err(), StoreError::NoContent);
    }

    #[tokio::test]
    async fn delete_user_cascades_versions_and_keys() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        store.push("alice", "h1", "ct1", "127.0.0.1").await.unwrap();
        store.add_pgp("alice", "armored-key", false, "127.0.0.1").await.unwrap();

        store.delete_user("alice", "127.0.0.1").await.unwrap();
        assert_eq!(store.delete_user("alice", "127.0.0.1").await.unwrap_err(), StoreError::NoSuchUser);
    }

    #[tokio::test]
    async fn confirm_and_revoke_pgp_require_an_existing_row() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        assert_eq!(store.confirm_pgp("alice", "nope", "127.0.0.1").await.unwrap_err(), StoreError::NoSuchKey);

        store.add_pgp("alice", "armored-key", false, "127.0.0.1").await.unwrap();
        store.confirm_pgp("alice", "armored-key", "127.0.0.1").await.unwrap();
        let active = store.list_active_pgp("alice", "127.0.0.1").await.unwrap();
        assert!(active[0].confirmed);

        store.revoke_pgp("alice", "armored-key", "127.0.0.1").await.unwrap();
        assert!(store.list_active_pgp("alice", "127.0.0.1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_log_is_ordered_by_timestamp_ascending() {
        let store = InMemoryBackend::new();
        store.sign_up("alice", "hunter2", "127.0.0.1").await.unwrap();
        store.push("alice", "h1", "ct1", "127.0.0.1").await.unwrap();
        store.pull("alice", "h1", "127.0.0.1").await.unwrap();

        let log = store.get_log("alice", "127.0.0.1").await.unwrap();
        let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["signup", "push", "pull"]);
    }
}
