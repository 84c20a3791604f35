//! Webhook signature scheme used by the payment gateway.
//!
//! The gateway signs `"{timestamp}.{raw_body}"` with HMAC-SHA256 and ships
//! the result in a `t=<unix>,v1=<hex>` header. Verification recomputes the
//! digest over the exact raw bytes received, compares in constant time, and
//! rejects timestamps older than the replay tolerance.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// How far in the past a signature timestamp may lie, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Signs a webhook payload for the given unix timestamp.
pub fn sign_event_payload(timestamp: i64, payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a complete signature header, the way the gateway would.
pub fn signature_header(timestamp: i64, payload: &[u8], secret: &str) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        sign_event_payload(timestamp, payload, secret)
    )
}

/// Verifies a signature header against the raw payload bytes.
pub fn verify_signature(header: &str, payload: &[u8], secret: &str) -> bool {
    verify_signature_at(header, payload, secret, chrono::Utc::now().timestamp())
}

fn verify_signature_at(header: &str, payload: &[u8], secret: &str, now: i64) -> bool {
    let Some((timestamp, candidates)) = parse_header(header) else {
        return false;
    };
    if now - timestamp > SIGNATURE_TOLERANCE_SECS {
        return false;
    }
    let expected = sign_event_payload(timestamp, payload, secret);
    candidates
        .iter()
        .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())))
}

/// Parses `t=<unix>,v1=<hex>` in any element order. The gateway may send
/// several `v1` entries during secret rotation; any one of them matching is
/// enough.
fn parse_header(header: &str) -> Option<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = Some(value.parse().ok()?),
            "v1" => candidates.push(value),
            // older scheme versions are ignored, not rejected
            _ => {}
        }
    }
    if candidates.is_empty() {
        return None;
    }
    Some((timestamp?, candidates))
}
