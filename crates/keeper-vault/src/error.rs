//! Vault error taxonomy.

use std::fmt;

#[derive(Debug)]
pub enum VaultError {
    /// `save()` was called again with no mutation since the last
    /// successful save. Expected in normal flow; callers MUST skip I/O.
    HashUnchanged,
    /// `load()` was given bytes that do not decode as a valid vault.
    /// The vault's prior state is left untouched.
    Decode(keeper_secrets::DecodeError),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::HashUnchanged => write!(f, "vault content hash unchanged since last save"),
            VaultError::Decode(e) => write!(f, "vault decode failed: {}", e),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<keeper_secrets::DecodeError> for VaultError {
    fn from(e: keeper_secrets::DecodeError) -> Self {
        VaultError::Decode(e)
    }
}
