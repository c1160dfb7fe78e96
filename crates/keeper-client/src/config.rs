use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Client configuration, loaded by layering a JSON file under environment
/// variables: file values are read first, then any `KEEPER_REMOTE_*`
/// variable that is set overrides the corresponding field. `mode` is not
/// itself configurable; it is derived from whether a remote URL ended up set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "remote-http")]
    pub remote_http: String,
    #[serde(default = "default_storage")]
    pub storage: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Standalone,
    ClientServer,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Standalone => write!(f, "standalone"),
            Mode::ClientServer => write!(f, "client-server"),
        }
    }
}

fn default_mode() -> Mode {
    Mode::Standalone
}

fn default_storage() -> String {
    "secrets.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: default_mode(),
            username: String::new(),
            password: String::new(),
            remote_http: String::new(),
            storage: default_storage(),
        }
    }
}

impl Config {
    /// Loads `path` if present, then applies `KEEPER_REMOTE_*` env overrides,
    /// then derives `mode` from whether a remote URL is set. A missing or
    /// unparsable config file is not fatal: it falls back to defaults, since
    /// every field can also arrive purely from the environment.
    pub fn load(path: impl AsRef<Path>) -> Config {
        let mut cfg = Self::from_file(path.as_ref()).unwrap_or_else(|| {
            tracing::warn!(path = %path.as_ref().display(), "configuration file can not be read, using defaults");
            Config::default()
        });
        cfg.apply_env();
        if !cfg.remote_http.is_empty() {
            cfg.mode = Mode::ClientServer;
        } else {
            cfg.mode = Mode::Standalone;
        }
        cfg
    }

    fn from_file(path: &Path) -> Option<Config> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "configuration can not be parsed");
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("KEEPER_REMOTE_USERNAME") {
            if !v.is_empty() {
                self.username = v;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_REMOTE_PASSWORD") {
            if !v.is_empty() {
                self.password = v;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_REMOTE_URL") {
            if !v.is_empty() {
                self.remote_http = v;
            }
        }
    }

    /// Passphrase guarding the local private key, read straight from the
    /// environment rather than the config file: it is a secret, not a setting.
    pub fn pgp_passphrase() -> Option<String> {
        std::env::var("KEEPER_PGP_PASSPHRASE").ok().filter(|v| !v.is_empty())
    }

    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage)
    }

    pub fn is_client_server(&self) -> bool {
        matches!(self.mode, Mode::ClientServer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::load("/nonexistent/path/config.json");
        assert_eq!(cfg.mode, Mode::Standalone);
        assert_eq!(cfg.storage, "secrets.db");
    }

    #[test]
    fn remote_url_in_file_derives_client_server_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"remote-http":"https://localhost:8443","storage":"x.db"}"#).unwrap();
        let cfg = Config::load(&path);
        assert_eq!(cfg.mode, Mode::ClientServer);
        assert_eq!(cfg.remote_http, "https://localhost:8443");
        assert_eq!(cfg.storage, "x.db");
    }
}
