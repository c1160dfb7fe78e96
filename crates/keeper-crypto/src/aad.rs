//! AAD + Context conventions, adapted from the single-recipient envelope's
//! locked scheme for internal service use, to bind the vault's AEAD body to
//! a domain-separated context and a small set of anti-replay fields.
//!
//! Context (bytes):
//!   b"keeper|ctx|v1|" + env + b"|" + purpose
//!
//! AAD (bytes):
//!   b"keeper|aad|v1" || TLV(sender) || TLV(recipient) || TLV(route) || TLV(ts_ms) || TLV(seq) || TLV(msg_id_16)
//!
//! TLV: T: u8, L: u16 big-endian, V: bytes

use crate::error::EncodingError;

pub type MsgId16 = [u8; 16];

pub const CONTEXT_PREFIX: &[u8] = b"keeper|ctx|v1|";
pub const AAD_PREFIX: &[u8] = b"keeper|aad|v1";

#[repr(u8)]
#[derive(Clone, Copy)]
pub enum AadTlvType {
    SenderId = 0x01,
    RecipientId = 0x02,
    Route = 0x03,
    TimestampUnixMs = 0x04,
    Sequence = 0x05,
    MsgId16 = 0x06,
}

pub fn build_context(env: &str, purpose: &str) -> Vec<u8> {
    let env_b = env.as_bytes();
    let purpose_b = purpose.as_bytes();
    let mut out = Vec::with_capacity(CONTEXT_PREFIX.len() + env_b.len() + 1 + purpose_b.len());
    out.extend_from_slice(CONTEXT_PREFIX);
    out.extend_from_slice(env_b);
    out.push(b'|');
    out.extend_from_slice(purpose_b);
    out
}

pub fn build_aad(
    sender_id: &str,
    recipient_id: &str,
    route: &str,
    ts_unix_ms: u64,
    seq: u64,
    msg_id: MsgId16,
) -> Result<Vec<u8>, EncodingError> {
    let s = sender_id.as_bytes();
    let r = recipient_id.as_bytes();
    let rt = route.as_bytes();

    let mut out = Vec::with_capacity(
        AAD_PREFIX.len() + tlv_size(s.len()) + tlv_size(r.len()) + tlv_size(rt.len()) + tlv_size(8) + tlv_size(8) + tlv_size(16),
    );
    out.extend_from_slice(AAD_PREFIX);
    push_tlv(&mut out, AadTlvType::SenderId, s)?;
    push_tlv(&mut out, AadTlvType::RecipientId, r)?;
    push_tlv(&mut out, AadTlvType::Route, rt)?;
    push_tlv(&mut out, AadTlvType::TimestampUnixMs, &ts_unix_ms.to_be_bytes())?;
    push_tlv(&mut out, AadTlvType::Sequence, &seq.to_be_bytes())?;
    push_tlv(&mut out, AadTlvType::MsgId16, &msg_id)?;
    Ok(out)
}

pub fn generate_msg_id() -> Result<MsgId16, EncodingError> {
    let mut id = [0u8; 16];
    getrandom::getrandom(&mut id).map_err(|_| EncodingError)?;
    Ok(id)
}

#[inline]
fn tlv_size(v_len: usize) -> usize {
    1 + 2 + v_len
}

#[inline]
fn push_tlv(out: &mut Vec<u8>, t: AadTlvType, v: &[u8]) -> Result<(), EncodingError> {
    if v.len() > u16::MAX as usize {
        return Err(EncodingError);
    }
    out.push(t as u8);
    out.extend_from_slice(&(v.len() as u16).to_be_bytes());
    out.extend_from_slice(v);
    Ok(())
}
