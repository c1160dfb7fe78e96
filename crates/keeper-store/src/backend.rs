use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{ActionLogEntry, PgpKey, VaultVersion};

/// The four-table relational store spec'd in the account/vault/key/audit
/// contract. Every operation appends to the action log exactly where the
/// contract says to and nowhere else.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn sign_up(&self, username: &str, password: &str, ip: &str) -> Result<(), StoreError>;
    async fn sign_in(&self, username: &str, password: &str, ip: &str) -> Result<(), StoreError>;
    async fn delete_user(&self, username: &str, ip: &str) -> Result<(), StoreError>;

    async fn push(&self, username: &str, hash: &str, ciphertext: &str, ip: &str) -> Result<(), StoreError>;
    async fn pull(&self, username: &str, hash: &str, ip: &str) -> Result<String, StoreError>;
    async fn versions(&self, username: &str, ip: &str) -> Result<Vec<VaultVersion>, StoreError>;

    async fn list_active_pgp(&self, username: &str, ip: &str) -> Result<Vec<PgpKey>, StoreError>;
    async fn add_pgp(&self, username: &str, armored: &str, confirmed: bool, ip: &str) -> Result<(), StoreError>;
    async fn confirm_pgp(&self, username: &str, armored: &str, ip: &str) -> Result<(), StoreError>;
    async fn revoke_pgp(&self, username: &str, armored: &str, ip: &str) -> Result<(), StoreError>;

    async fn get_log(&self, username: &str, ip: &str) -> Result<Vec<ActionLogEntry>, StoreError>;
}
