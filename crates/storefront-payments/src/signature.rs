//! Webhook Signature Verification
//!
//! The `stripe-signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>]`
//! where each `v1` is HMAC-SHA256 over `"{t}.{payload}"` keyed with the
//! endpoint's signing secret.
//!
//! Used when async-stripe cannot decode an event into its typed models
//! (events sent with a newer API version than the crate knows).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds
pub const TOLERANCE_SECS: u64 = 300;

/// Verify `header` against `payload` at time `now` (unix seconds)
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("missing v1 signature".into()));
    }
    if now.abs_diff(timestamp) > TOLERANCE_SECS {
        return Err(PaymentError::WebhookSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mac = signed_mac(payload, timestamp, secret)?;
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::WebhookSignature("signature mismatch".into()))
    }
}

/// Produce a header value for `payload`, as the processor would
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = signed_mac(payload, timestamp, secret)?;
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={digest}"))
}

fn signed_mac(payload: &[u8], timestamp: i64, secret: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("bad webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_payload(payload, SECRET, NOW).unwrap();
        assert!(verify_signature(payload, &header, SECRET, NOW + 10).is_ok());
    }

    #[test]
    fn test_tampered_payload() {
        let header = sign_payload(br#"{"id":"evt_1"}"#, SECRET, NOW).unwrap();
        let result = verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, NOW);
        assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
    }

    #[test]
    fn test_stale_timestamp() {
        let payload = b"{}";
        let header = sign_payload(payload, SECRET, NOW).unwrap();
        assert!(verify_signature(payload, &header, SECRET, NOW + 301).is_err());
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = b"{}";
        let good = sign_payload(payload, SECRET, NOW).unwrap();
        let digest = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={digest}");
        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1=00");
            let result = verify_signature(b"{}", &header, SECRET, NOW);
            assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
        }
        let header = sign_payload(b"{}", SECRET, NOW).unwrap();
        assert!(verify_signature(b"{}", &header, SECRET, i64::MIN).is_err());
    }

    #[test]
    fn test_malformed_header() {
        assert!(verify_signature(b"{}", "garbage", SECRET, NOW).is_err());
        assert!(verify_signature(b"{}", &format!("t={NOW}"), SECRET, NOW).is_err());
    }
}
