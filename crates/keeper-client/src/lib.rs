//! Sync client: wires a local [`Keyring`]/[`Vault`] pair to the remote
//! keeper-server over HTTP and a notification WebSocket, following the
//! handshake, save, and rollback contracts in spec.md §4.8.

mod config;
mod error;
mod local;
mod transport;

pub use config::{Config, Mode};
pub use error::ClientError;
pub use transport::{HttpTransport, Notification, NotificationClient, SigninOutcome};

use std::path::{Path, PathBuf};

use keeper_keyring::Keyring;
use keeper_vault::Vault;

/// Ties together the local keyring and vault with an optional remote
/// connection. In standalone mode `transport`/`notifications` stay `None`
/// and every operation is purely local.
pub struct Client {
    keyring: Keyring,
    vault: Vault,
    config: Config,
    vault_path: PathBuf,
    transport: Option<HttpTransport>,
    notifications: Option<NotificationClient>,
}

impl Client {
    /// Loads configuration from `config_path`, bootstraps the local keyring
    /// under `./openpgp`, and loads `./secrets.db` if present. Does not
    /// contact the remote yet; call [`Client::connect`] for that.
    pub async fn bootstrap(config_path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let config = Config::load(config_path);
        let passphrase = Config::pgp_passphrase()
            .ok_or_else(|| ClientError::Storage("KEEPER_PGP_PASSPHRASE is not set".into()))?;

        let keyring = Keyring::bootstrap(local::KEYRING_DIR, &passphrase)?;
        let vault = Vault::new();
        let vault_path = config.storage_path();

        let mut client = Client { keyring, vault, config, vault_path, transport: None, notifications: None };
        client.load_local_vault().await?;
        Ok(client)
    }

    async fn load_local_vault(&mut self) -> Result<(), ClientError> {
        if let Some(armored) = local::read_vault_file(&self.vault_path)? {
            let plaintext = self.keyring.decrypt(&armored)?;
            self.vault.load(&plaintext).await?;
        }
        Ok(())
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Signs in against the configured remote, merges any confirmed foreign
    /// keys into the trusted set, catches up to the latest pushed version,
    /// and opens the notification stream. A no-op in standalone mode.
    ///
    /// Returns the signin outcome so the caller can print the right message
    /// for the 403/208 "needs confirmation from another device" paths —
    /// those are not transport failures, just states to wait out.
    pub async fn connect(&mut self) -> Result<SigninOutcome, ClientError> {
        if !self.config.is_client_server() {
            return Ok(SigninOutcome::Trusted);
        }

        let transport = HttpTransport::new(self.config.remote_http.clone())?;
        let outcome = transport
            .signin(&self.config.username, &self.config.password, &self.keyring.my_public_key())
            .await?;

        if outcome != SigninOutcome::Trusted {
            self.transport = Some(transport);
            return Ok(outcome);
        }

        self.catch_up(&transport).await?;
        self.transport = Some(transport);
        Ok(SigninOutcome::Trusted)
    }

    /// Merges confirmed foreign keys, then pulls whatever is newer than the
    /// local vault hash.
    async fn catch_up(&mut self, transport: &HttpTransport) -> Result<(), ClientError> {
        let active = transport.pgp_list().await?;
        let confirmed: Vec<String> = active.into_iter().filter(|k| k.confirmed).map(|k| k.publickey).collect();
        if !confirmed.is_empty() {
            self.keyring.reload_public_keys(&confirmed)?;
        }

        let versions = transport.versions().await?;
        let latest = match versions.into_iter().max_by_key(|v| v.time) {
            Some(v) => v,
            None => return Ok(()),
        };
        if latest.hashsum == self.vault.hash().await {
            return Ok(());
        }
        if let Some(pulled) = transport.pull(&latest.hashsum).await? {
            let plaintext = self.keyring.decrypt(&pulled.payload)?;
            self.vault.load(&plaintext).await?;
            local::write_vault_file(&self.vault_path, &pulled.payload)?;
        }
        Ok(())
    }

    /// Starts the notification stream subscription; the caller drains
    /// `subscribe()` and reacts via [`Client::describe_notification`].
    /// Only valid after a `Trusted` [`Client::connect`].
    pub fn open_notifications(&mut self) -> Option<tokio::sync::broadcast::Receiver<Notification>> {
        let transport = self.transport.as_ref()?;
        let ws_url = ws_url_from_http(&self.config.remote_http);
        let token = transport.session_token()?;
        let client = NotificationClient::new(ws_url, &token);
        let rx = client.subscribe();
        client.connect();
        self.notifications = Some(client);
        Some(rx)
    }

    /// Encodes and encrypts the current vault, writes it locally, and (in
    /// client-server mode) pushes it. `HashUnchanged` is not an error here:
    /// it means there was nothing new to save, matching spec.md §7's
    /// "MUST NOT cause I/O or push" rule.
    pub async fn save(&self) -> Result<(), ClientError> {
        let plaintext = match self.vault.save().await {
            Ok(bytes) => bytes,
            Err(keeper_vault::VaultError::HashUnchanged) => {
                tracing::info!("save: vault hash unchanged, nothing to do");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let armored = self.keyring.encrypt(&plaintext)?;
        local::write_vault_file(&self.vault_path, &armored)?;

        if let Some(transport) = &self.transport {
            let hashsum = self.vault.hash().await;
            transport.push(&armored, &hashsum).await?;
        }
        Ok(())
    }

    /// Re-encrypts under the current trusted set without requiring the
    /// plaintext to have changed — used after a [`Keyring::reload_public_keys`]
    /// call following a revocation, so old recipients lose access to future
    /// pulls even though nothing in the vault itself moved.
    pub async fn reencrypt_and_push(&self) -> Result<(), ClientError> {
        let plaintext = self.vault.re_encrypt().await;
        let armored = self.keyring.encrypt(&plaintext)?;
        local::write_vault_file(&self.vault_path, &armored)?;
        if let Some(transport) = &self.transport {
            let hashsum = self.vault.hash().await;
            transport.push(&armored, &hashsum).await?;
        }
        Ok(())
    }

    /// Pulls the version with content hash `hash`, decrypts it, and loads it
    /// over the in-memory vault, discarding unsaved local state.
    pub async fn rollback(&mut self, hash: &str) -> Result<(), ClientError> {
        let transport = self.transport.as_ref().ok_or(ClientError::Transport("not connected".into()))?;
        let pulled = transport.pull(hash).await?.ok_or(ClientError::Transport("no such version".into()))?;
        let plaintext = self.keyring.decrypt(&pulled.payload)?;
        self.vault.load(&plaintext).await?;
        local::write_vault_file(&self.vault_path, &pulled.payload)?;
        Ok(())
    }

    /// Human-readable one-liner for a notification, per spec.md §7's policy
    /// that stream errors/events are logged, not surfaced as failures.
    pub fn describe_notification(notification: &Notification) -> String {
        match notification {
            Notification::NewVersion { hash } => format!("a newer vault version is available (hash {hash})"),
            Notification::NewUntrustedKey { armored } => {
                format!("an unconfirmed device key enrolled ({} bytes armored)", armored.len())
            }
        }
    }
}

fn ws_url_from_http(remote_http: &str) -> String {
    let ws_base = if let Some(rest) = remote_http.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = remote_http.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("wss://{remote_http}")
    };
    format!("{ws_base}/api/v1/keeper/ws")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_swaps_https_scheme_for_wss() {
        assert_eq!(ws_url_from_http("https://localhost:8443"), "wss://localhost:8443/api/v1/keeper/ws");
    }

    #[test]
    fn ws_url_swaps_http_scheme_for_ws() {
        assert_eq!(ws_url_from_http("http://localhost:8080"), "ws://localhost:8080/api/v1/keeper/ws");
    }
}
