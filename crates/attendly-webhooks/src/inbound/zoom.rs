//! Zoom meeting lifecycle webhooks.
//!
//! Zoom sends a shared verification token in the `authorization` header
//! rather than signing the body. The token comparison is constant-time.

use axum::http::HeaderMap;

use crate::crypto::constant_time_eq;
use crate::inbound::{EventRef, ProviderVerifier};

pub struct ZoomVerifier;

impl ProviderVerifier for ZoomVerifier {
    fn verify(&self, headers: &HeaderMap, _body: &[u8], secret: &str) -> bool {
        let Some(token) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
            return false;
        };

        constant_time_eq(token.as_bytes(), secret.as_bytes())
    }

    fn event_ref(&self, _headers: &HeaderMap, body: &[u8]) -> Option<EventRef> {
        let json: serde_json::Value = serde_json::from_slice(body).ok()?;
        let event_type = json.get("event")?.as_str()?.to_string();

        // Zoom has no top-level event id; the meeting UUID plus the event
        // timestamp identifies an occurrence.
        let uuid = json
            .get("payload")?
            .get("object")?
            .get("uuid")?
            .as_str()?;
        let event_ts = json.get("event_ts")?.as_i64()?;

        Some(EventRef {
            event_id: format!("{uuid}:{event_ts}"),
            event_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "zoom-verification-token";

    fn headers(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_str(token).unwrap());
        h
    }

    fn body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event": "meeting.ended",
            "event_ts": 1706400000123i64,
            "payload": {"object": {"uuid": "4444AAAbbb==", "id": 123456789}}
        }))
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        assert!(ZoomVerifier.verify(&headers(SECRET), &body(), SECRET));
    }

    #[test]
    fn test_verify_rejects_wrong_token() {
        assert!(!ZoomVerifier.verify(&headers("wrong-token"), &body(), SECRET));
    }

    #[test]
    fn test_verify_rejects_missing_header() {
        assert!(!ZoomVerifier.verify(&HeaderMap::new(), &body(), SECRET));
    }

    #[test]
    fn test_event_ref_combines_uuid_and_timestamp() {
        let event = ZoomVerifier.event_ref(&HeaderMap::new(), &body()).unwrap();
        assert_eq!(event.event_id, "4444AAAbbb==:1706400000123");
        assert_eq!(event.event_type, "meeting.ended");
    }

    #[test]
    fn test_event_ref_missing_uuid() {
        let body = serde_json::to_vec(&serde_json::json!({
            "event": "meeting.ended",
            "event_ts": 1706400000123i64,
            "payload": {"object": {}}
        }))
        .unwrap();
        assert!(ZoomVerifier.event_ref(&HeaderMap::new(), &body).is_none());
    }
}
