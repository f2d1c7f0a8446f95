//! Stripe billing webhooks.
//!
//! Stripe signs with the same timestamped HMAC scheme we use for outbound
//! deliveries: `Stripe-Signature: t=<unix>,v1=<hex>` over `{t}.{body}`.

use axum::http::HeaderMap;

use crate::crypto;
use crate::inbound::{EventRef, ProviderVerifier};

pub struct StripeVerifier;

impl ProviderVerifier for StripeVerifier {
    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
        let Some(header) = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };

        crypto::verify_signature(header, secret, body, crypto::DEFAULT_TOLERANCE_SECS)
    }

    fn event_ref(&self, _headers: &HeaderMap, body: &[u8]) -> Option<EventRef> {
        let json: serde_json::Value = serde_json::from_slice(body).ok()?;
        Some(EventRef {
            event_id: json.get("id")?.as_str()?.to_string(),
            event_type: json.get("type")?.as_str()?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_stripe_test";

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let header = crypto::sign_payload(secret, body);
        headers.insert("stripe-signature", HeaderValue::from_str(&header).unwrap());
        headers
    }

    fn event_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1NG8Du2eZvKYlo2C",
            "type": "invoice.paid",
            "data": {"object": {"id": "in_1NG8"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_verify_valid_signature() {
        let body = event_body();
        let headers = signed_headers(SECRET, &body);
        assert!(StripeVerifier.verify(&headers, &body, SECRET));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let body = event_body();
        let headers = signed_headers("whsec_other", &body);
        assert!(!StripeVerifier.verify(&headers, &body, SECRET));
    }

    #[test]
    fn test_verify_rejects_missing_header() {
        assert!(!StripeVerifier.verify(&HeaderMap::new(), &event_body(), SECRET));
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let body = event_body();
        let stale = chrono::Utc::now().timestamp() - 3600;
        let header = crypto::sign_payload_at(SECRET, &body, stale);
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", HeaderValue::from_str(&header).unwrap());
        assert!(!StripeVerifier.verify(&headers, &body, SECRET));
    }

    #[test]
    fn test_event_ref_extraction() {
        let body = event_body();
        let event = StripeVerifier.event_ref(&HeaderMap::new(), &body).unwrap();
        assert_eq!(event.event_id, "evt_1NG8Du2eZvKYlo2C");
        assert_eq!(event.event_type, "invoice.paid");
    }

    #[test]
    fn test_event_ref_missing_fields() {
        assert!(StripeVerifier
            .event_ref(&HeaderMap::new(), br#"{"type":"invoice.paid"}"#)
            .is_none());
        assert!(StripeVerifier
            .event_ref(&HeaderMap::new(), b"not json")
            .is_none());
    }
}
