use std::fmt;

/// Client-side error taxonomy from spec.md §7, narrowed to the kinds a sync
/// client can actually produce.
#[derive(Debug)]
pub enum ClientError {
    KeyParse,
    KeyLocked,
    HashUnchanged,
    Unauthorized,
    BadCredentials,
    BadRequest(String),
    Storage(String),
    Transport(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::KeyParse => write!(f, "could not parse armored key"),
            ClientError::KeyLocked => write!(f, "wrong passphrase for locked private key"),
            ClientError::HashUnchanged => write!(f, "vault content hash unchanged since last save"),
            ClientError::Unauthorized => write!(f, "missing, expired, or tampered session token"),
            ClientError::BadCredentials => write!(f, "bad username or password"),
            ClientError::BadRequest(m) => write!(f, "bad request: {m}"),
            ClientError::Storage(m) => write!(f, "local storage error: {m}"),
            ClientError::Transport(m) => write!(f, "transport error: {m}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<keeper_keyring::KeyringError> for ClientError {
    fn from(e: keeper_keyring::KeyringError) -> Self {
        use keeper_keyring::KeyringError::*;
        match e {
            KeyParse => ClientError::KeyParse,
            KeyLocked => ClientError::KeyLocked,
            NoTrustedRecipients => ClientError::KeyParse,
            Storage => ClientError::Storage(e.to_string()),
        }
    }
}

impl From<keeper_vault::VaultError> for ClientError {
    fn from(e: keeper_vault::VaultError) -> Self {
        match e {
            keeper_vault::VaultError::HashUnchanged => ClientError::HashUnchanged,
            keeper_vault::VaultError::Decode(_) => ClientError::Storage(e.to_string()),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}
