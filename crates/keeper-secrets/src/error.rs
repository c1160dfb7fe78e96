//! Error types for secret construction and encoding.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOtpMethod;

impl fmt::Display for InvalidOtpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "otp method must be one of \"TOTP\", \"HOTP\"")
    }
}

impl std::error::Error for InvalidOtpMethod {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidExpiry;

impl fmt::Display for InvalidExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "credit card expiry must parse as \"MM/YY\"")
    }
}

impl std::error::Error for InvalidExpiry {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError;

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed secret encoding")
    }
}

impl std::error::Error for DecodeError {}
