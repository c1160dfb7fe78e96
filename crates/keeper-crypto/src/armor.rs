//! ASCII armor: PGP-style `-----BEGIN ... -----` framing around base64,
//! wrapped at 64 columns, so ciphertext and keys travel safely through
//! JSON string fields and terminal output alike.

use base64::{engine::general_purpose::STANDARD, Engine as _};

const LINE_WIDTH: usize = 64;

pub fn armor(label: &str, bytes: &[u8]) -> String {
    let body = STANDARD.encode(bytes);
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 32);
    out.push_str(&format!("-----BEGIN {label}-----\n"));
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 output is ascii"));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmorError;

impl std::fmt::Display for ArmorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed armor")
    }
}

impl std::error::Error for ArmorError {}

pub fn dearmor(label: &str, text: &str) -> Result<Vec<u8>, ArmorError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let start = text.find(&begin).ok_or(ArmorError)?;
    let body_start = start + begin.len();
    let stop = text[body_start..].find(&end).ok_or(ArmorError)?;
    let body: String = text[body_start..body_start + stop].chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(body).map_err(|_| ArmorError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armor_round_trips() {
        let bytes = vec![1u8, 2, 3, 4, 5, 255, 0, 128];
        let armored = armor("KEEPER MESSAGE", &bytes);
        assert!(armored.starts_with("-----BEGIN KEEPER MESSAGE-----\n"));
        let recovered = dearmor("KEEPER MESSAGE", &armored).unwrap();
        assert_eq!(recovered, bytes);
    }

    #[test]
    fn dearmor_rejects_wrong_label() {
        let armored = armor("KEEPER MESSAGE", b"hi");
        assert!(dearmor("KEEPER PUBLIC KEY", &armored).is_err());
    }
}
