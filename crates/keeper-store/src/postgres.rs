//! Postgres-backed `StorageBackend`, grounded on Nexus's
//! `nexus-db/src/repository/users.rs` query style: free functions over a
//! pool, `sqlx::query`/`query_as` with bound placeholders, `fetch_one`/
//! `fetch_optional`. Every statement runs under the 15s timeout spec.md §4.4
//! requires; anything that times out or errors collapses to `Storage`
//! unless it's a unique-index collision this backend knows how to name.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::types::{ActionLogEntry, PgpKey, VaultVersion};

const QUERY_TIMEOUT: Duration = Duration::from_secs(15);
const UNIQUE_VIOLATION: &str = "23505";

enum TimedError {
    Db(sqlx::Error),
    Timeout,
}

impl From<TimedError> for StoreError {
    fn from(e: TimedError) -> Self {
        match e {
            TimedError::Db(sqlx::Error::RowNotFound) => StoreError::NoContent,
            TimedError::Db(_) | TimedError::Timeout => StoreError::Storage,
        }
    }
}

async fn timed<T, F>(fut: F) -> Result<T, TimedError>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(inner) => inner.map_err(TimedError::Db),
        Err(_) => Err(TimedError::Timeout),
    }
}

fn is_unique_violation(e: &TimedError) -> bool {
    matches!(e, TimedError::Db(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

async fn append_log(pool: &PgPool, username: &str, action: &str, detail: Option<&str>) -> Result<(), StoreError> {
    timed(
        sqlx::query("INSERT INTO action_log (username, ts, action, detail) VALUES ($1, $2, $3, $4)")
            .bind(username)
            .bind(Utc::now().timestamp_millis())
            .bind(action)
            .bind(detail)
            .execute(pool),
    )
    .await?;
    Ok(())
}

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn sign_up(&self, username: &str, password: &str, _ip: &str) -> Result<(), StoreError> {
        let hash = keeper_auth::hash_password(password).map_err(|_| StoreError::Storage)?;
        let result = timed(
            sqlx::query("INSERT INTO users (username, password_hash) VALUES ($1, $2)")
                .bind(username)
                .bind(&hash)
                .execute(&self.pool),
        )
        .await;
        if let Err(e) = result {
            return Err(if is_unique_violation(&e) { StoreError::UserExists } else { e.into() });
        }
        append_log(&self.pool, username, "signup", None).await?;
        Ok(())
    }

    async fn sign_in(&self, username: &str, password: &str, _ip: &str) -> Result<(), StoreError> {
        let row: Option<(String,)> = timed(
            sqlx::query_as("SELECT password_hash FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool),
        )
        .await?;
        let (hash,) = row.ok_or(StoreError::BadCredentials)?;
        keeper_auth::verify_password(password, &hash).map_err(|_| StoreError::BadCredentials)?;
        append_log(&self.pool, username, "signin", None).await?;
        Ok(())
    }

    async fn delete_user(&self, username: &str, _ip: &str) -> Result<(), StoreError> {
        let deleted = timed(
            sqlx::query("DELETE FROM users WHERE username = $1")
                .bind(username)
                .execute(&self.pool),
        )
        .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NoSuchUser);
        }
        timed(
            sqlx::query("DELETE FROM vault_versions WHERE username = $1")
                .bind(username)
                .execute(&self.pool),
        )
        .await?;
        timed(
            sqlx::query("DELETE FROM public_keys WHERE username = $1")
                .bind(username)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn push(&self, username: &str, hash: &str, ciphertext: &str, _ip: &str) -> Result<(), StoreError> {
        let result = timed(
            sqlx::query("INSERT INTO vault_versions (username, hash, ciphertext, ts) VALUES ($1, $2, $3, $4)")
                .bind(username)
                .bind(hash)
                .bind(ciphertext)
                .bind(Utc::now().timestamp_millis())
                .execute(&self.pool),
        )
        .await;
        if let Err(e) = result {
            return Err(if is_unique_violation(&e) { StoreError::DuplicateVersion } else { e.into() });
        }
        append_log(&self.pool, username, "push", Some(hash)).await?;
        Ok(())
    }

    async fn pull(&self, username: &str, hash: &str, _ip: &str) -> Result<String, StoreError> {
        let row: Option<(String,)> = timed(
            sqlx::query_as(
                "SELECT ciphertext FROM vault_versions WHERE username = $1 AND hash = $2 ORDER BY ts DESC LIMIT 1",
            )
            .bind(username)
            .bind(hash)
            .fetch_optional(&self.pool),
        )
        .await?;
        let (ciphertext,) = row.ok_or(StoreError::NoContent)?;
        append_log(&self.pool, username, "pull", None).await?;
        Ok(ciphertext)
    }

    async fn versions(&self, username: &str, _ip: &str) -> Result<Vec<VaultVersion>, StoreError> {
        let rows: Vec<(i64, String)> = timed(
            sqlx::query_as("SELECT DISTINCT ts, hash FROM vault_versions WHERE username = $1")
                .bind(username)
                .fetch_all(&self.pool),
        )
        .await?;
        if rows.is_empty() {
            return Err(StoreError::NoContent);
        }
        append_log(&self.pool, username, "get versions", None).await?;
        Ok(rows.into_iter().map(|(timestamp, hash)| VaultVersion { timestamp, hash }).collect())
    }

    async fn list_active_pgp(&self, username: &str, _ip: &str) -> Result<Vec<PgpKey>, StoreError> {
        let rows: Vec<(i64, String, bool)> = timed(
            sqlx::query_as("SELECT ts, armored, confirmed FROM public_keys WHERE username = $1 AND revoked = false")
                .bind(username)
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|(timestamp, armored, confirmed)| PgpKey { timestamp, armored, confirmed })
            .collect())
    }

    async fn add_pgp(&self, username: &str, armored: &str, confirmed: bool, _ip: &str) -> Result<(), StoreError> {
        let result = timed(
            sqlx::query(
                "INSERT INTO public_keys (username, armored, confirmed, revoked, ts) VALUES ($1, $2, $3, false, $4)",
            )
            .bind(username)
            .bind(armored)
            .bind(confirmed)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool),
        )
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn confirm_pgp(&self, username: &str, armored: &str, _ip: &str) -> Result<(), StoreError> {
        let updated = timed(
            sqlx::query("UPDATE public_keys SET confirmed = true WHERE username = $1 AND armored = $2")
                .bind(username)
                .bind(armored)
                .execute(&self.pool),
        )
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NoSuchKey);
        }
        Ok(())
    }

    async fn revoke_pgp(&self, username: &str, armored: &str, _ip: &str) -> Result<(), StoreError> {
        let updated = timed(
            sqlx::query("UPDATE public_keys SET revoked = true WHERE username = $1 AND armored = $2")
                .bind(username)
                .bind(armored)
                .execute(&self.pool),
        )
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NoSuchKey);
        }
        Ok(())
    }

    async fn get_log(&self, username: &str, _ip: &str) -> Result<Vec<ActionLogEntry>, StoreError> {
        let rows: Vec<(i64, String, Option<String>)> = timed(
            sqlx::query_as("SELECT ts, action, detail FROM action_log WHERE username = $1 ORDER BY ts ASC")
                .bind(username)
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|(timestamp, action, detail)| ActionLogEntry { timestamp, action, detail })
            .collect())
    }
}
