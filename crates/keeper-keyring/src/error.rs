use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyringError {
    KeyParse,
    KeyLocked,
    NoTrustedRecipients,
    Storage,
}

impl fmt::Display for KeyringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyringError::KeyParse => write!(f, "could not parse armored key"),
            KeyringError::KeyLocked => write!(f, "wrong passphrase for locked private key"),
            KeyringError::NoTrustedRecipients => write!(f, "trusted public key set is empty"),
            KeyringError::Storage => write!(f, "local key storage error"),
        }
    }
}

impl std::error::Error for KeyringError {}

impl From<keeper_crypto::DecryptionError> for KeyringError {
    fn from(_: keeper_crypto::DecryptionError) -> Self {
        KeyringError::KeyParse
    }
}

impl From<keeper_crypto::EncodingError> for KeyringError {
    fn from(_: keeper_crypto::EncodingError) -> Self {
        KeyringError::NoTrustedRecipients
    }
}

impl From<std::io::Error> for KeyringError {
    fn from(_: std::io::Error) -> Self {
        KeyringError::Storage
    }
}
