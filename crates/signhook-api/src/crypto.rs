//! HMAC-SHA256 event hash generation and verification.
//!
//! Dropbox Sign signs each callback with
//! `hex(HMAC_SHA256(api_key, event_time || event_type))` and sends the result
//! as `event.event_hash`. Only lowercase hex is produced by the provider, so
//! the comparison is exact.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Event hash errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No secret is available to compute the expected hash.
    #[error("no secret configured")]
    MissingSecret,
    /// The secret could not be used as an HMAC key.
    #[error("invalid secret key")]
    InvalidSecret,
    /// The claimed hash does not match.
    #[error("event hash verification failed")]
    VerificationFailed,
}

/// Generates the lowercase hex HMAC-SHA256 of `message` under `secret`.
///
/// # Errors
///
/// Returns `SignatureError::MissingSecret` for an empty secret; an empty key
/// would let anyone forge hashes.
///
/// # Example
///
/// ```
/// use signhook_api::crypto::generate_event_hash;
///
/// let hash = generate_event_hash(b"1700000000signature_request_signed", b"key").unwrap();
/// assert_eq!(hash.len(), 64);
/// ```
pub fn generate_event_hash(message: &[u8], secret: &[u8]) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `claimed` against the expected hash of `message`.
///
/// # Errors
///
/// `MissingSecret` when `secret` is empty, `VerificationFailed` on mismatch.
pub fn verify_event_hash(message: &[u8], claimed: &str, secret: &[u8]) -> Result<(), SignatureError> {
    let expected = generate_event_hash(message, secret)?;

    if timing_safe_eq(expected.as_bytes(), claimed.as_bytes()) {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}

/// Constant-time comparison. Length is not secret (always 64 for a valid
/// hash), so a length mismatch returns early.
fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_vector() {
        // RFC 4231 test case 2.
        let hash = generate_event_hash(b"what do ya want for nothing?", b"Jefe").unwrap();
        assert_eq!(hash, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn verify_accepts_generated_hash() {
        let message = b"1700000000signature_request_signed";
        let hash = generate_event_hash(message, b"secret").unwrap();
        assert_eq!(verify_event_hash(message, &hash, b"secret"), Ok(()));
    }

    #[test]
    fn verify_rejects_other_secret() {
        let message = b"1700000000signature_request_signed";
        let hash = generate_event_hash(message, b"secret").unwrap();
        assert_eq!(
            verify_event_hash(message, &hash, b"other"),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn verify_rejects_uppercase_hex() {
        let message = b"1700000000signature_request_signed";
        let hash = generate_event_hash(message, b"secret").unwrap().to_uppercase();
        assert_eq!(
            verify_event_hash(message, &hash, b"secret"),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn empty_secret_never_verifies() {
        assert_eq!(generate_event_hash(b"m", b""), Err(SignatureError::MissingSecret));
        assert_eq!(verify_event_hash(b"m", "", b""), Err(SignatureError::MissingSecret));
    }

    #[test]
    fn timing_safe_eq_cases() {
        assert!(timing_safe_eq(b"hello", b"hello"));
        assert!(!timing_safe_eq(b"hello", b"world"));
        assert!(!timing_safe_eq(b"hello", b"hello_world"));
        assert!(timing_safe_eq(b"", b""));
    }
}
