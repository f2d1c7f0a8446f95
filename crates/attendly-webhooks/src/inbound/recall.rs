//! Recall.ai meeting bot webhooks (Standard Webhooks scheme).
//!
//! Headers: `webhook-id`, `webhook-timestamp`, `webhook-signature`. The
//! signature header carries one or more space-separated `v1,<base64>` values,
//! each an HMAC-SHA256 over `{id}.{timestamp}.{body}`. Secrets may be
//! base64-encoded.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use axum::http::HeaderMap;

use crate::crypto::{constant_time_eq, timestamp_in_window, DEFAULT_TOLERANCE_SECS};
use crate::inbound::{EventRef, ProviderVerifier};

type HmacSha256 = Hmac<Sha256>;

pub struct RecallVerifier;

impl ProviderVerifier for RecallVerifier {
    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
        let Some(msg_id) = header_str(headers, "webhook-id") else {
            return false;
        };
        let Some(timestamp) = header_str(headers, "webhook-timestamp") else {
            return false;
        };
        let Some(signature_header) = header_str(headers, "webhook-signature") else {
            return false;
        };

        let Ok(ts) = timestamp.parse::<i64>() else {
            return false;
        };
        if !timestamp_in_window(ts, DEFAULT_TOLERANCE_SECS) {
            return false;
        }

        // Standard Webhooks secrets are usually base64; fall back to raw bytes
        let secret_bytes = BASE64
            .decode(secret)
            .unwrap_or_else(|_| secret.as_bytes().to_vec());

        let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(&secret_bytes) else {
            return false;
        };
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        let expected = format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()));

        signature_header
            .split_whitespace()
            .any(|sig| constant_time_eq(sig.as_bytes(), expected.as_bytes()))
    }

    fn event_ref(&self, headers: &HeaderMap, body: &[u8]) -> Option<EventRef> {
        let event_id = header_str(headers, "webhook-id")?.to_string();
        let json: serde_json::Value = serde_json::from_slice(body).ok()?;
        Some(EventRef {
            event_id,
            event_type: json.get("event")?.as_str()?.to_string(),
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "cmVjYWxsLXRlc3Qtc2VjcmV0";

    fn sign(msg_id: &str, timestamp: &str, body: &[u8]) -> String {
        let secret_bytes = BASE64.decode(SECRET).unwrap();
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&secret_bytes).unwrap();
        mac.update(format!("{msg_id}.{timestamp}.").as_bytes());
        mac.update(body);
        format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
    }

    fn headers(msg_id: &str, timestamp: &str, signature: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("webhook-id", HeaderValue::from_str(msg_id).unwrap());
        h.insert("webhook-timestamp", HeaderValue::from_str(timestamp).unwrap());
        h.insert("webhook-signature", HeaderValue::from_str(signature).unwrap());
        h
    }

    fn body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event": "bot.done",
            "data": {"bot_id": "bot_abc123"}
        }))
        .unwrap()
    }

    #[test]
    fn test_verify_valid_signature() {
        let body = body();
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("msg_1", &ts, &body);
        assert!(RecallVerifier.verify(&headers("msg_1", &ts, &sig), &body, SECRET));
    }

    #[test]
    fn test_verify_accepts_multi_signature_header() {
        let body = body();
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("msg_1", &ts, &body);
        let multi = format!("v1,Zm9yZ2Vk {sig}");
        assert!(RecallVerifier.verify(&headers("msg_1", &ts, &multi), &body, SECRET));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let body = body();
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("msg_1", &ts, &body);
        assert!(!RecallVerifier.verify(&headers("msg_1", &ts, &sig), b"tampered", SECRET));
    }

    #[test]
    fn test_verify_rejects_wrong_msg_id() {
        let body = body();
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("msg_1", &ts, &body);
        assert!(!RecallVerifier.verify(&headers("msg_2", &ts, &sig), &body, SECRET));
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let body = body();
        let ts = (chrono::Utc::now().timestamp() - 3600).to_string();
        let sig = sign("msg_1", &ts, &body);
        assert!(!RecallVerifier.verify(&headers("msg_1", &ts, &sig), &body, SECRET));
    }

    #[test]
    fn test_verify_rejects_extreme_timestamps() {
        // Timestamps near the i64 limits are rejected, not an overflow
        let body = body();
        for ts in [i64::MIN.to_string(), i64::MAX.to_string()] {
            let sig = sign("msg_1", &ts, &body);
            assert!(!RecallVerifier.verify(&headers("msg_1", &ts, &sig), &body, SECRET));
        }
    }

    #[test]
    fn test_verify_rejects_missing_headers() {
        assert!(!RecallVerifier.verify(&HeaderMap::new(), &body(), SECRET));
    }

    #[test]
    fn test_event_ref_uses_message_id() {
        let body = body();
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("msg_1", &ts, &body);
        let event = RecallVerifier
            .event_ref(&headers("msg_1", &ts, &sig), &body)
            .unwrap();
        assert_eq!(event.event_id, "msg_1");
        assert_eq!(event.event_type, "bot.done");
    }
}
