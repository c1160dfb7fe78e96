//! Stateless bearer-token auth and password hashing for the server store.
//!
//! [`Auth`] draws a 256-byte signing secret once, at construction, and keeps
//! it in process memory only — it is never written to disk and never
//! exchanged over the wire. A process restart therefore invalidates every
//! token in flight; callers size their deployment around that. The secret
//! itself never leaves this module: only [`Auth::issue`] and
//! [`Auth::validate`] touch it.

mod error;

pub use error::AuthError;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const SECRET_BYTES: usize = 256;
const TOKEN_TTL_HOURS: i64 = 2;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Claims {
    name: String,
    exp: i64,
}

/// Issues and validates bearer tokens signed with a boot-time secret that
/// exists only for the lifetime of this process.
pub struct Auth {
    secret: Vec<u8>,
}

impl Auth {
    /// Draw a fresh 256-byte signing secret. Every call produces a secret
    /// unrelated to any other, including a prior instance in the same run.
    pub fn new() -> Self {
        let mut secret = vec![0u8; SECRET_BYTES];
        getrandom::getrandom(&mut secret).expect("failed to draw signing secret");
        tracing::info!("drew fresh in-memory auth signing secret");
        Self { secret }
    }

    /// Sign a bearer token asserting `username`, expiring two hours out.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let claims = Claims {
            name: username.to_string(),
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))?;
        Ok(token)
    }

    /// Verify the signature and expiry, returning the asserted username.
    /// This is the only authoritative check in this crate; every other
    /// accessor below parses claims without verifying them.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)?;
        Ok(data.claims.name)
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the username claim without checking the signature or expiry.
/// Intended only for the bus's expiry sweep and for a client inspecting its
/// own token; never treat this as an authorization decision, use
/// [`Auth::validate`] for that.
pub fn name_from_token(token: &str) -> Option<String> {
    claims_unchecked(token).map(|c| c.name)
}

/// Parse the expiry claim (unix seconds) without checking the signature.
/// Same caveat as [`name_from_token`].
pub fn expiry_from_token(token: &str) -> Option<i64> {
    claims_unchecked(token).map(|c| c.exp)
}

fn claims_unchecked(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

/// Hash a password with Argon2id for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash produced by [`hash_password`].
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::BadCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::BadCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_validate_round_trips() {
        let auth = Auth::new();
        let token = auth.issue("alice").unwrap();
        assert_eq!(auth.validate(&token).unwrap(), "alice");
    }

    #[test]
    fn validate_rejects_token_from_a_different_secret() {
        let a = Auth::new();
        let b = Auth::new();
        let token = a.issue("alice").unwrap();
        assert!(b.validate(&token).is_err());
    }

    #[test]
    fn validate_rejects_expired_token() {
        let auth = Auth::new();
        let claims = Claims { name: "alice".to_string(), exp: (Utc::now() - Duration::hours(1)).timestamp() };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(&auth.secret)).unwrap();
        assert!(auth.validate(&token).is_err());
    }

    #[test]
    fn name_from_token_reads_claims_from_an_untrusted_secret() {
        let auth = Auth::new();
        let token = auth.issue("bob").unwrap();
        assert_eq!(name_from_token(&token).unwrap(), "bob");
        assert!(expiry_from_token(&token).unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn hash_verify_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
        assert!(verify_password("wrong", &hash).is_err());
    }
}
