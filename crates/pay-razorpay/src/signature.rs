//! # Signature Verification
//!
//! HMAC-SHA256 signatures used by Razorpay:
//!
//! - checkout confirmations sign `order_id|payment_id` with the key secret
//! - webhooks sign the raw request body with the webhook secret
//!
//! Both are lowercase hex. Anything else is rejected before decoding, then
//! the bytes are compared through `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use pay_core::{PaymentConfirmation, PaymentError, PaymentResult};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Characters of a signature that may appear in logs
const LOG_PREFIX_LEN: usize = 8;

/// Hex length of a SHA-256 MAC
const SIGNATURE_HEX_LEN: usize = 64;

fn mac(secret: &str) -> PaymentResult<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Configuration(format!("Invalid HMAC key: {}", e)))
}

/// Compute the hex-encoded HMAC-SHA256 of `message`
pub fn sign(secret: &str, message: &[u8]) -> PaymentResult<String> {
    let mut mac = mac(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex-encoded signature against `message`.
///
/// Only the exact form `sign` produces is accepted: 64 lowercase hex
/// digits, no surrounding whitespace. Anything else is a mismatch, not an error.
pub fn verify(secret: &str, message: &[u8], signature: &str) -> bool {
    if !is_canonical_hex(signature) {
        return false;
    }
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = mac(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&provided).is_ok()
}

fn is_canonical_hex(signature: &str) -> bool {
    signature.len() == SIGNATURE_HEX_LEN
        && signature
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Signature the hosted checkout returns for a successful payment
pub fn payment_signature(order_id: &str, payment_id: &str, key_secret: &str) -> PaymentResult<String> {
    sign(key_secret, format!("{}|{}", order_id, payment_id).as_bytes())
}

pub fn verify_payment(confirmation: &PaymentConfirmation, key_secret: &str) -> bool {
    verify(
        key_secret,
        confirmation.signed_payload().as_bytes(),
        &confirmation.signature,
    )
}

/// Verify a webhook signature over the exact bytes received
pub fn verify_webhook(body: &[u8], signature: &str, webhook_secret: &str) -> bool {
    verify(webhook_secret, body, signature)
}

/// Short prefix of a signature, safe to log
pub fn redact(signature: &str) -> String {
    let prefix: String = signature.chars().take(LOG_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret";
    const KNOWN: &str = "15656b40fea6f2159b578efa459e969de9f5e223fb8a08393e274ac578d9d005";

    fn confirmation(signature: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            payment_id: "pay_XYZ".to_string(),
            order_id: "order_ABC".to_string(),
            signature: signature.to_string(),
        }
    }

    #[test]
    fn test_known_payment_signature() {
        let sig = payment_signature("order_ABC", "pay_XYZ", SECRET).unwrap();
        assert_eq!(sig, KNOWN);
        assert!(verify_payment(&confirmation(KNOWN), SECRET));
    }

    #[test]
    fn test_case_change_fails() {
        // Index 5 is the first letter ('b')
        let mut chars: Vec<char> = KNOWN.chars().collect();
        chars[5] = chars[5].to_ascii_uppercase();
        let mutated: String = chars.into_iter().collect();
        assert_eq!(&mutated[..8], "15656B40");
        assert!(!verify_payment(&confirmation(&mutated), SECRET));

        assert!(!verify_payment(&confirmation(&KNOWN.to_uppercase()), SECRET));
    }

    #[test]
    fn test_surrounding_whitespace_fails() {
        assert!(!verify_payment(&confirmation(&format!(" {}", KNOWN)), SECRET));
        assert!(!verify_payment(&confirmation(&format!("{}\n", KNOWN)), SECRET));
    }

    #[test]
    fn test_changed_ids_fail() {
        let order_changed = PaymentConfirmation {
            payment_id: "pay_XYZ".to_string(),
            order_id: "order_ABD".to_string(),
            signature: KNOWN.to_string(),
        };
        assert!(!verify_payment(&order_changed, SECRET));

        let payment_changed = PaymentConfirmation {
            payment_id: "pay_XYz".to_string(),
            order_id: "order_ABC".to_string(),
            signature: KNOWN.to_string(),
        };
        assert!(!verify_payment(&payment_changed, SECRET));
    }

    #[test]
    fn test_any_single_change_fails() {
        // Flip every hex digit in turn
        for i in 0..KNOWN.len() {
            let mut chars: Vec<char> = KNOWN.chars().collect();
            chars[i] = if chars[i] == '0' { '1' } else { '0' };
            let mutated: String = chars.into_iter().collect();
            assert!(!verify_payment(&confirmation(&mutated), SECRET), "index {}", i);
        }

        // Swapped ids
        let swapped = PaymentConfirmation {
            payment_id: "order_ABC".to_string(),
            order_id: "pay_XYZ".to_string(),
            signature: KNOWN.to_string(),
        };
        assert!(!verify_payment(&swapped, SECRET));

        // Wrong secret
        assert!(!verify_payment(&confirmation(KNOWN), "other_secret"));
    }

    #[test]
    fn test_malformed_signatures_fail() {
        assert!(!verify_payment(&confirmation(""), SECRET));
        assert!(!verify_payment(&confirmation("not-hex"), SECRET));
        assert!(!verify_payment(&confirmation(&KNOWN[..32]), SECRET));
        assert!(!verify_payment(&confirmation(&format!("{}00", KNOWN)), SECRET));
    }

    #[test]
    fn test_webhook_signature_over_raw_body() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = "4673dd707ef4c41b987cb7fefe1583142dc702388c93145b7814b9ad3d3c183e";
        assert!(verify_webhook(body, sig, "whsec"));

        // Same JSON, different bytes
        let reformatted = br#"{ "event": "payment.captured" }"#;
        assert!(!verify_webhook(reformatted, sig, "whsec"));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact(KNOWN), "15656b40...");
        assert_eq!(redact("abc"), "abc...");
    }
}
