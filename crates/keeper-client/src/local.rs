//! Local on-disk layout for the sync client.
//!
//! ```text
//! ./openpgp/          handed to `keeper_keyring::Keyring::bootstrap`
//! ./secrets.db        one armored ciphertext, the whole file replaced on every save
//! ./config.json       see config.rs
//! ```
//!
//! Writes are atomic: write to a `.tmp` sibling, then rename, matching
//! `keeper_keyring::storage::LocalKeyStore`'s discipline.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ClientError;

pub const KEYRING_DIR: &str = "openpgp";

/// Reads the armored vault ciphertext at `path`, if present.
pub fn read_vault_file(path: impl AsRef<Path>) -> Result<Option<String>, ClientError> {
    match fs::read_to_string(path.as_ref()) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Atomically overwrites the vault ciphertext at `path`.
pub fn write_vault_file(path: impl AsRef<Path>, armored: &str) -> Result<(), ClientError> {
    let path = path.as_ref();
    let tmp = tmp_sibling(path);
    fs::write(&tmp, armored.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_vault_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.db");
        assert!(read_vault_file(&path).unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.db");
        write_vault_file(&path, "-----BEGIN PGP MESSAGE-----").unwrap();
        assert_eq!(read_vault_file(&path).unwrap().unwrap(), "-----BEGIN PGP MESSAGE-----");
    }

    #[test]
    fn write_is_atomic_no_tmp_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.db");
        write_vault_file(&path, "ciphertext").unwrap();
        assert!(!tmp_sibling(&path).exists());
    }
}
