//! Tagged secret payloads: the only kinds of data a vault can hold.
//!
//! Every [`Secret`] exposes a stable [`SecretKind`] tag and a deterministic
//! binary encoding that preserves that tag, so decoding always selects the
//! right constructor back.

mod encoding;
mod error;

pub use error::{DecodeError, InvalidExpiry, InvalidOtpMethod};

use chrono::{DateTime, TimeZone, Utc};

/// Discriminant for a [`Secret`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    CredentialPair,
    OneTimePassword,
    CreditCard,
    FreeText,
    BinaryBlob,
}

/// OTP generation method. Only these two strings are accepted by
/// [`Secret::one_time_password`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMethod {
    Totp,
    Hotp,
}

impl OtpMethod {
    fn parse(s: &str) -> Result<Self, InvalidOtpMethod> {
        match s {
            "TOTP" => Ok(OtpMethod::Totp),
            "HOTP" => Ok(OtpMethod::Hotp),
            _ => Err(InvalidOtpMethod),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            OtpMethod::Totp => "TOTP",
            OtpMethod::Hotp => "HOTP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimePassword {
    pub method: OtpMethod,
    pub issuer: String,
    pub account_name: String,
    /// Base32-encoded TOTP/HOTP seed.
    pub secret: String,
    pub recovery_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditCard {
    pub number: String,
    pub holder: String,
    /// 0..=9999 — CVVs with fewer than 4 digits keep their leading zeros
    /// logically, but are stored as a plain integer per the source format.
    pub cvv: u16,
    /// First instant of the month *following* the stated "MM/YY" expiry,
    /// per spec.
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeText {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBlob {
    pub data: Vec<u8>,
}

/// A single named secret payload. Tag-preserving and deterministically
/// encodable via [`Secret::encode`] / [`Secret::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    CredentialPair(CredentialPair),
    OneTimePassword(OneTimePassword),
    CreditCard(CreditCard),
    FreeText(FreeText),
    BinaryBlob(BinaryBlob),
}

impl Secret {
    pub fn credential_pair(username: impl Into<String>, password: impl Into<String>) -> Self {
        Secret::CredentialPair(CredentialPair {
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn one_time_password(
        method: &str,
        issuer: impl Into<String>,
        account_name: impl Into<String>,
        secret: impl Into<String>,
        recovery_codes: Vec<String>,
    ) -> Result<Self, InvalidOtpMethod> {
        let method = OtpMethod::parse(method)?;
        Ok(Secret::OneTimePassword(OneTimePassword {
            method,
            issuer: issuer.into(),
            account_name: account_name.into(),
            secret: secret.into(),
            recovery_codes,
        }))
    }

    /// `expiry` must parse as `"MM/YY"`. The stored instant is the first
    /// instant of the month following the stated expiry (i.e. the card is
    /// valid through the end of its printed month).
    pub fn credit_card(
        number: impl Into<String>,
        holder: impl Into<String>,
        cvv: u16,
        expiry: &str,
    ) -> Result<Self, InvalidExpiry> {
        let expiry = parse_card_expiry(expiry)?;
        Ok(Secret::CreditCard(CreditCard {
            number: number.into(),
            holder: holder.into(),
            cvv,
            expiry,
        }))
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Secret::FreeText(FreeText { text: text.into() })
    }

    pub fn binary_blob(data: Vec<u8>) -> Self {
        Secret::BinaryBlob(BinaryBlob { data })
    }

    pub fn kind(&self) -> SecretKind {
        match self {
            Secret::CredentialPair(_) => SecretKind::CredentialPair,
            Secret::OneTimePassword(_) => SecretKind::OneTimePassword,
            Secret::CreditCard(_) => SecretKind::CreditCard,
            Secret::FreeText(_) => SecretKind::FreeText,
            Secret::BinaryBlob(_) => SecretKind::BinaryBlob,
        }
    }

    /// Returns the payload. Since `Secret` is already the tagged payload,
    /// this is simply a reference to self — kept as an explicit operation
    /// to mirror the source's `Kind()`/`Value()` pair.
    pub fn value(&self) -> &Secret {
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        encoding::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        encoding::decode(bytes)
    }
}

fn parse_card_expiry(s: &str) -> Result<DateTime<Utc>, InvalidExpiry> {
    let (month_str, year_str) = s.split_once('/').ok_or(InvalidExpiry)?;
    let month: u32 = month_str.parse().map_err(|_| InvalidExpiry)?;
    let year_suffix: i32 = year_str.parse().map_err(|_| InvalidExpiry)?;
    if !(1..=12).contains(&month) || year_str.len() != 2 {
        return Err(InvalidExpiry);
    }
    let year = 2000 + year_suffix;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or(InvalidExpiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_rejects_unknown_method() {
        assert!(Secret::one_time_password("FOO", "acme", "alice", "JBSWY3DP", vec![]).is_err());
    }

    #[test]
    fn otp_accepts_totp_and_hotp() {
        assert!(Secret::one_time_password("TOTP", "acme", "alice", "JBSWY3DP", vec![]).is_ok());
        assert!(Secret::one_time_password("HOTP", "acme", "alice", "JBSWY3DP", vec![]).is_ok());
    }

    #[test]
    fn credit_card_expiry_rolls_to_next_month() {
        let s = Secret::credit_card("4111111111111111", "Alice", 123, "01/30").unwrap();
        match s {
            Secret::CreditCard(cc) => {
                assert_eq!(cc.expiry, Utc.with_ymd_and_hms(2030, 2, 1, 0, 0, 0).unwrap());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn credit_card_expiry_rolls_december_into_next_year() {
        let s = Secret::credit_card("4111111111111111", "Alice", 1, "12/29").unwrap();
        match s {
            Secret::CreditCard(cc) => {
                assert_eq!(cc.expiry, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn credit_card_rejects_malformed_expiry() {
        assert!(Secret::credit_card("4111", "Alice", 1, "13/30").is_err());
        assert!(Secret::credit_card("4111", "Alice", 1, "0130").is_err());
    }

    #[test]
    fn round_trip_every_kind() {
        let secrets = vec![
            Secret::credential_pair("alice", "hunter2"),
            Secret::one_time_password("TOTP", "acme", "alice", "JBSWY3DP", vec!["r1".into(), "r2".into()]).unwrap(),
            Secret::credit_card("4111111111111111", "Alice", 123, "01/30").unwrap(),
            Secret::free_text("remember the milk"),
            Secret::binary_blob(vec![0, 1, 2, 255]),
        ];
        for s in secrets {
            let encoded = s.encode();
            let decoded = Secret::decode(&encoded).expect("decode");
            assert_eq!(decoded, s);
            assert_eq!(decoded.kind(), s.kind());
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let s = Secret::credential_pair("alice", "hunter2");
        assert_eq!(s.encode(), s.encode());
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let s = Secret::free_text("hello");
        let mut encoded = s.encode();
        encoded.truncate(encoded.len() - 1);
        assert!(Secret::decode(&encoded).is_err());
    }
}
