//! `Stripe-Signature` header verification.
//!
//! The header is `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed
//! payload is `"{t}.{body}"` keyed with the endpoint secret; any matching
//! `v1` entry within the tolerance window is accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::ports::PaymentGatewayError;

/// Maximum clock skew between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, PaymentGatewayError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse::<i64>().ok();
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp
        .ok_or_else(|| PaymentGatewayError::invalid_signature("missing or invalid timestamp"))?;
    if signatures.is_empty() {
        return Err(PaymentGatewayError::invalid_signature("no v1 signature"));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Check `header` against `payload` at `now_unix`.
pub(super) fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), PaymentGatewayError> {
    let parsed = parse_header(header)?;
    let skew = now_unix
        .checked_sub(parsed.timestamp)
        .map(i64::unsigned_abs);
    if skew.is_none_or(|skew| skew > SIGNATURE_TOLERANCE_SECS.unsigned_abs()) {
        return Err(PaymentGatewayError::invalid_signature(
            "timestamp outside tolerance",
        ));
    }

    let matched = parsed.signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });
    if matched {
        Ok(())
    } else {
        Err(PaymentGatewayError::invalid_signature(
            "no signature matched the payload",
        ))
    }
}

#[cfg(test)]
pub(super) fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("any key length");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
