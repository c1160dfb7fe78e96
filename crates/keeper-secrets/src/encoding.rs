//! Deterministic binary encoding for [`crate::Secret`].
//!
//! Layout: `tag[1] || fields...`, each variable-length field as
//! `len[4 BE] || bytes`, matching the length-prefixed TLV convention used
//! throughout the crypto layer's own wire format.

use crate::error::DecodeError;
use crate::{CreditCard, OneTimePassword, OtpMethod, Secret};
use chrono::{DateTime, TimeZone, Utc};

const TAG_CREDENTIAL_PAIR: u8 = 0x01;
const TAG_ONE_TIME_PASSWORD: u8 = 0x02;
const TAG_CREDIT_CARD: u8 = 0x03;
const TAG_FREE_TEXT: u8 = 0x04;
const TAG_BINARY_BLOB: u8 = 0x05;

const OTP_METHOD_TOTP: u8 = 0x00;
const OTP_METHOD_HOTP: u8 = 0x01;

pub(crate) fn encode(secret: &Secret) -> Vec<u8> {
    let mut out = Vec::new();
    match secret {
        Secret::CredentialPair(c) => {
            out.push(TAG_CREDENTIAL_PAIR);
            push_field(&mut out, c.username.as_bytes());
            push_field(&mut out, c.password.as_bytes());
        }
        Secret::OneTimePassword(otp) => {
            out.push(TAG_ONE_TIME_PASSWORD);
            out.push(match otp.method {
                OtpMethod::Totp => OTP_METHOD_TOTP,
                OtpMethod::Hotp => OTP_METHOD_HOTP,
            });
            push_field(&mut out, otp.issuer.as_bytes());
            push_field(&mut out, otp.account_name.as_bytes());
            push_field(&mut out, otp.secret.as_bytes());
            out.extend_from_slice(&(otp.recovery_codes.len() as u32).to_be_bytes());
            for code in &otp.recovery_codes {
                push_field(&mut out, code.as_bytes());
            }
        }
        Secret::CreditCard(cc) => {
            out.push(TAG_CREDIT_CARD);
            push_field(&mut out, cc.number.as_bytes());
            push_field(&mut out, cc.holder.as_bytes());
            out.extend_from_slice(&cc.cvv.to_be_bytes());
            out.extend_from_slice(&cc.expiry.timestamp().to_be_bytes());
        }
        Secret::FreeText(t) => {
            out.push(TAG_FREE_TEXT);
            push_field(&mut out, t.text.as_bytes());
        }
        Secret::BinaryBlob(b) => {
            out.push(TAG_BINARY_BLOB);
            push_field(&mut out, &b.data);
        }
    }
    out
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Secret, DecodeError> {
    let mut r = Reader::new(bytes);
    let tag = r.u8()?;
    let secret = match tag {
        TAG_CREDENTIAL_PAIR => Secret::credential_pair(
            r.str_field()?,
            r.str_field()?,
        ),
        TAG_ONE_TIME_PASSWORD => {
            let method = match r.u8()? {
                OTP_METHOD_TOTP => OtpMethod::Totp,
                OTP_METHOD_HOTP => OtpMethod::Hotp,
                _ => return Err(DecodeError),
            };
            let issuer = r.str_field()?;
            let account_name = r.str_field()?;
            let secret = r.str_field()?;
            let count = r.u32()?;
            let mut recovery_codes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                recovery_codes.push(r.str_field()?);
            }
            Secret::OneTimePassword(OneTimePassword {
                method,
                issuer,
                account_name,
                secret,
                recovery_codes,
            })
        }
        TAG_CREDIT_CARD => {
            let number = r.str_field()?;
            let holder = r.str_field()?;
            let cvv = r.u16()?;
            let timestamp = r.i64()?;
            let expiry: DateTime<Utc> = Utc.timestamp_opt(timestamp, 0).single().ok_or(DecodeError)?;
            Secret::CreditCard(CreditCard { number, holder, cvv, expiry })
        }
        TAG_FREE_TEXT => Secret::free_text(r.str_field()?),
        TAG_BINARY_BLOB => Secret::binary_blob(r.bytes_field()?),
        _ => return Err(DecodeError),
    };
    r.expect_exhausted()?;
    Ok(secret)
}

fn push_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() - self.pos < n {
            return Err(DecodeError);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bytes_field(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn str_field(&mut self) -> Result<String, DecodeError> {
        let bytes = self.bytes_field()?;
        String::from_utf8(bytes).map_err(|_| DecodeError)
    }

    fn expect_exhausted(&self) -> Result<(), DecodeError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(DecodeError)
        }
    }
}
