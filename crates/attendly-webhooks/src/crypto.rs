//! Cryptographic operations for webhook secrets and payload signing.
//!
//! - AES-256-GCM encryption/decryption for endpoint secrets at rest
//! - Timestamped HMAC-SHA256 signature headers for outbound deliveries

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::WebhookError;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Replay window for signature verification, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Endpoint secrets
// ---------------------------------------------------------------------------

/// Generate a fresh endpoint signing secret. Shown to the customer exactly
/// once, at creation or rotation.
pub fn generate_endpoint_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}

/// Encrypt a plaintext secret to a base64-encoded string for DB storage.
///
/// Format: base64(nonce || ciphertext || auth_tag)
pub fn encrypt_secret(plaintext: &str, key: &[u8]) -> Result<String, WebhookError> {
    if key.len() != 32 {
        return Err(WebhookError::EncryptionFailed(format!(
            "Invalid key length: expected 32 bytes, got {}",
            key.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| WebhookError::EncryptionFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| WebhookError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&result))
}

/// Decrypt a base64-encoded secret from DB storage back to plaintext.
pub fn decrypt_secret(encoded: &str, key: &[u8]) -> Result<String, WebhookError> {
    if key.len() != 32 {
        return Err(WebhookError::EncryptionFailed(format!(
            "Invalid key length: expected 32 bytes, got {}",
            key.len()
        )));
    }

    let encrypted = BASE64
        .decode(encoded)
        .map_err(|e| WebhookError::EncryptionFailed(format!("Base64 decode failed: {e}")))?;

    if encrypted.len() < NONCE_SIZE + 1 {
        return Err(WebhookError::EncryptionFailed(
            "Invalid encrypted data format".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| WebhookError::EncryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(&encrypted[..NONCE_SIZE]);
    let ciphertext = &encrypted[NONCE_SIZE..];

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| WebhookError::EncryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| WebhookError::EncryptionFailed(e.to_string()))
}

// ---------------------------------------------------------------------------
// HMAC-SHA256 payload signing
// ---------------------------------------------------------------------------

/// Compute HMAC-SHA256 over `{timestamp}.{body}`, hex-encoded.
pub fn compute_hmac_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    hex::encode(mac.finalize().into_bytes())
}

/// Build the outbound signature header for a payload signed at the current
/// time: `t=<unix-seconds>,v1=<hex>`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    sign_payload_at(secret, body, chrono::Utc::now().timestamp())
}

/// Build the signature header for an explicit timestamp.
pub fn sign_payload_at(secret: &str, body: &[u8], timestamp: i64) -> String {
    let ts = timestamp.to_string();
    let signature = compute_hmac_signature(secret, &ts, body);
    format!("t={ts},v1={signature}")
}

/// Verify a `t=..,v1=..` signature header against a payload.
///
/// Returns false for a malformed header, a timestamp outside the tolerance
/// window, or a digest mismatch. The digest comparison is constant-time.
pub fn verify_signature(
    header: &str,
    secret: &str,
    body: &[u8],
    tolerance_secs: i64,
) -> bool {
    let Some((timestamp, expected)) = parse_signature_header(header) else {
        return false;
    };

    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };

    if !timestamp_in_window(ts, tolerance_secs) {
        return false;
    }

    let computed = compute_hmac_signature(secret, &timestamp, body);
    constant_time_eq(expected.as_bytes(), computed.as_bytes())
}

/// Whether `ts` lies within `tolerance_secs` of the current time. The
/// timestamp is attacker-controlled, so the age computation must not
/// overflow; any value too extreme to subtract is out of the window.
pub(crate) fn timestamp_in_window(ts: i64, tolerance_secs: i64) -> bool {
    chrono::Utc::now()
        .timestamp()
        .checked_sub(ts)
        .and_then(i64::checked_abs)
        .map_or(false, |age| age <= tolerance_secs)
}

/// Parse `t=<ts>,v1=<hex>` into its components. Unknown keys are ignored.
fn parse_signature_header(header: &str) -> Option<(String, String)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => timestamp = Some(v.to_string()),
            (Some("v1"), Some(v)) => signature = Some(v.to_string()),
            _ => {}
        }
    }

    Some((timestamp?, signature?))
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [0x42u8; 32]
    }

    // --- AES-GCM tests ---

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = "whsec_abcdef0123456789";

        let encrypted = encrypt_secret(plaintext, &key).expect("encryption failed");
        let decrypted = decrypt_secret(&encrypted, &key).expect("decryption failed");

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_different_encryptions_produce_different_ciphertext() {
        let key = test_key();
        let enc1 = encrypt_secret("same-secret", &key).unwrap();
        let enc2 = encrypt_secret("same-secret", &key).unwrap();

        // Random nonce makes ciphertexts differ
        assert_ne!(enc1, enc2);
        assert_eq!(
            decrypt_secret(&enc1, &key).unwrap(),
            decrypt_secret(&enc2, &key).unwrap()
        );
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];
        assert!(encrypt_secret("test", &short_key).is_err());
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let encrypted = encrypt_secret("secret", &[0x42u8; 32]).unwrap();
        assert!(decrypt_secret(&encrypted, &[0x43u8; 32]).is_err());
    }

    #[test]
    fn test_decrypt_invalid_base64() {
        assert!(decrypt_secret("not-valid-base64!!!", &test_key()).is_err());
    }

    // --- Secret generation ---

    #[test]
    fn test_generate_endpoint_secret_format() {
        let secret = generate_endpoint_secret();
        assert!(secret.starts_with("whsec_"));
        // 32 random bytes hex-encoded
        assert_eq!(secret.len(), "whsec_".len() + 64);
    }

    #[test]
    fn test_generate_endpoint_secret_unique() {
        assert_ne!(generate_endpoint_secret(), generate_endpoint_secret());
    }

    // --- Signature header tests ---

    #[test]
    fn test_sign_verify_roundtrip() {
        let header = sign_payload("secret", b"{\"event\":\"meeting.ended\"}");
        assert!(verify_signature(
            &header,
            "secret",
            b"{\"event\":\"meeting.ended\"}",
            DEFAULT_TOLERANCE_SECS
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let header = sign_payload("secret-a", b"payload");
        assert!(!verify_signature(
            &header,
            "secret-b",
            b"payload",
            DEFAULT_TOLERANCE_SECS
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let header = sign_payload("secret", b"payload");
        assert!(!verify_signature(
            &header,
            "secret",
            b"tampered",
            DEFAULT_TOLERANCE_SECS
        ));
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        // Correct digest, but signed outside the tolerance window
        let stale = chrono::Utc::now().timestamp() - DEFAULT_TOLERANCE_SECS - 10;
        let header = sign_payload_at("secret", b"payload", stale);
        assert!(!verify_signature(
            &header,
            "secret",
            b"payload",
            DEFAULT_TOLERANCE_SECS
        ));
    }

    #[test]
    fn test_verify_rejects_future_timestamp() {
        let future = chrono::Utc::now().timestamp() + DEFAULT_TOLERANCE_SECS + 10;
        let header = sign_payload_at("secret", b"payload", future);
        assert!(!verify_signature(
            &header,
            "secret",
            b"payload",
            DEFAULT_TOLERANCE_SECS
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_header() {
        assert!(!verify_signature("", "secret", b"payload", 300));
        assert!(!verify_signature("garbage", "secret", b"payload", 300));
        assert!(!verify_signature("t=123", "secret", b"payload", 300));
        assert!(!verify_signature("v1=deadbeef", "secret", b"payload", 300));
        assert!(!verify_signature(
            "t=notanumber,v1=deadbeef",
            "secret",
            b"payload",
            300
        ));
    }

    #[test]
    fn test_verify_rejects_extreme_timestamps() {
        // Values near the i64 limits must come back false, not overflow
        for ts in [i64::MIN, i64::MIN + 1, i64::MAX - 1, i64::MAX] {
            let header = format!("t={ts},v1=deadbeef");
            assert!(!verify_signature(&header, "secret", b"payload", 300));
        }
    }

    #[test]
    fn test_signature_header_shape() {
        let header = sign_payload_at("secret", b"payload", 1706400000);
        assert!(header.starts_with("t=1706400000,v1="));
        let (_, sig) = header.split_once("v1=").unwrap();
        // SHA256 = 32 bytes = 64 hex chars
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hmac_signature_deterministic() {
        let sig1 = compute_hmac_signature("secret", "1706400000", b"payload");
        let sig2 = compute_hmac_signature("secret", "1706400000", b"payload");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hi"));
    }
}
