//! WorkOS directory sync webhooks.
//!
//! `WorkOS-Signature: sha256=<hex>`, an HMAC-SHA256 over the raw body with
//! no timestamp component.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use axum::http::HeaderMap;

use crate::crypto::constant_time_eq;
use crate::inbound::{EventRef, ProviderVerifier};

type HmacSha256 = Hmac<Sha256>;

pub struct WorkosVerifier;

impl ProviderVerifier for WorkosVerifier {
    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
        let Some(header) = headers
            .get("workos-signature")
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };

        let Some(expected_hex) = header.strip_prefix("sha256=") else {
            return false;
        };

        let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        let computed = hex::encode(mac.finalize().into_bytes());

        constant_time_eq(computed.as_bytes(), expected_hex.as_bytes())
    }

    fn event_ref(&self, _headers: &HeaderMap, body: &[u8]) -> Option<EventRef> {
        let json: serde_json::Value = serde_json::from_slice(body).ok()?;
        Some(EventRef {
            event_id: json.get("id")?.as_str()?.to_string(),
            event_type: json.get("event")?.as_str()?.to_string(),
        })
    }
}
