//! Inbound webhook signature verification.
//!
//! Verifies a keyed HMAC-SHA256 MAC of the raw request body against a
//! shared secret, using a constant-time comparison so timing does not leak
//! how many leading bytes of the candidate MAC matched. An absent secret
//! disables verification entirely -- intended for local development only.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature does not match")]
    Mismatch,
    #[error("malformed signature header")]
    Malformed,
}

/// Verify `candidate` (a base64-encoded HMAC-SHA256 MAC) against `body`
/// using `secret`. Returns `Ok(())` when `secret` is `None` (verification
/// disabled) or when the MAC matches.
pub fn verify(secret: Option<&str>, body: &[u8], candidate: &str) -> Result<(), SignatureError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let expected_bytes = base64::engine::general_purpose::STANDARD
        .decode(candidate.trim())
        .map_err(|_| SignatureError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if computed.ct_eq(&expected_bytes).into() {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute the base64 MAC for `body` under `secret` (used by tests and by
/// any tooling that needs to produce a valid signed request).
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_disabled_without_secret() {
        assert!(verify(None, b"anything", "garbage").is_ok());
    }

    #[test]
    fn matching_signature_passes() {
        let secret = "shh";
        let body = b"{\"event_name\":\"item:added\"}";
        let sig = sign(secret, body);
        assert!(verify(Some(secret), body, &sig).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let secret = "shh";
        let sig = sign(secret, b"original");
        assert!(matches!(
            verify(Some(secret), b"tampered", &sig),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let secret = "shh";
        assert!(matches!(
            verify(Some(secret), b"body", "not-base64!!"),
            Err(SignatureError::Malformed)
        ));
    }
}
