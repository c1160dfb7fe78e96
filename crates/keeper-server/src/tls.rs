//! Self-issued TLS certificate bootstrap. Grounded on the teacher's
//! first-run-bootstrap-if-absent pattern (`bootstrap_api_keys` in
//! `citadel-api/src/main.rs`), applied here to a certificate file pair
//! instead of an admin API key.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

const CERT_PATH: &str = "./ssl/server.crt";
const KEY_PATH: &str = "./ssl/server.pem";

#[derive(Debug)]
pub enum TlsError {
    Generate(rcgen::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::Generate(e) => write!(f, "certificate generation failed: {e}"),
            TlsError::Io(e) => write!(f, "certificate I/O failed: {e}"),
        }
    }
}

impl std::error::Error for TlsError {}

impl From<rcgen::Error> for TlsError {
    fn from(e: rcgen::Error) -> Self {
        TlsError::Generate(e)
    }
}

impl From<std::io::Error> for TlsError {
    fn from(e: std::io::Error) -> Self {
        TlsError::Io(e)
    }
}

/// Generates a self-signed certificate on first run and writes it to
/// `./ssl/`. Subsequent boots reuse whatever is already on disk.
pub async fn bootstrap() -> Result<RustlsConfig, TlsError> {
    if !Path::new(CERT_PATH).exists() || !Path::new(KEY_PATH).exists() {
        tracing::info!(cert = CERT_PATH, key = KEY_PATH, "no TLS material found, generating self-signed certificate");
        let subject_alt_names = vec!["localhost".to_string()];
        let certified = rcgen::generate_simple_self_signed(subject_alt_names)?;

        if let Some(dir) = Path::new(CERT_PATH).parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(CERT_PATH, certified.cert.pem())?;
        std::fs::write(KEY_PATH, certified.key_pair.serialize_pem())?;
    } else {
        tracing::info!(cert = CERT_PATH, key = KEY_PATH, "reusing existing TLS material");
    }

    Ok(RustlsConfig::from_pem_file(CERT_PATH, KEY_PATH).await.map_err(TlsError::Io)?)
}
