//! Environment-driven configuration for the webhook system.

use std::collections::HashMap;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::dispatcher::MAX_RETRY_ATTEMPTS;
use crate::error::WebhookError;
use crate::inbound::Provider;

/// Configuration for the webhook subsystem.
#[derive(Debug, Clone)]
pub struct WebhooksConfig {
    /// 32-byte key for AES-256-GCM encryption of endpoint secrets at rest.
    pub encryption_key: [u8; 32],
    /// Allow plain-HTTP endpoint URLs (dev/test only).
    pub allow_http: bool,
    /// Per-organization endpoint limit.
    pub max_endpoints_per_org: i64,
    /// Shared secrets for inbound provider signature verification.
    pub provider_secrets: HashMap<Provider, String>,
    /// Delivery worker tuning.
    pub worker: WorkerConfig,
}

/// Tuning knobs for the delivery worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum in-flight deliveries.
    pub concurrency: usize,
    /// Queue poll interval when idle.
    pub poll_interval: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Jobs claimed longer than this are considered abandoned and released.
    pub stale_claim_after: Duration,
    /// How often to scan for stale claims.
    pub stale_release_interval: Duration,
    /// How often to sweep expired idempotency records.
    pub sweep_interval: Duration,
    /// Retention for processed inbound event records.
    pub idempotency_retention_days: i64,
    /// Maximum attempts per delivery before it is marked failed.
    pub max_attempts: i32,
    /// Consecutive failures before an endpoint is auto-disabled.
    pub disable_threshold: i32,
    /// Response bodies stored in the ledger are truncated to this length.
    pub max_response_body_len: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            stale_claim_after: Duration::from_secs(300),
            stale_release_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(3600),
            idempotency_retention_days: 7,
            max_attempts: MAX_RETRY_ATTEMPTS,
            disable_threshold: 10,
            max_response_body_len: 1000,
        }
    }
}

impl WebhooksConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `WEBHOOK_ENCRYPTION_KEY`: base64-encoded 32-byte key
    ///
    /// Optional:
    /// - `WEBHOOK_ALLOW_HTTP`: `true` to permit plain-HTTP endpoint URLs
    /// - `WEBHOOK_MAX_ENDPOINTS_PER_ORG`: default 25
    /// - `WEBHOOK_WORKER_CONCURRENCY`: default 10
    /// - `STRIPE_WEBHOOK_SECRET`, `RECALL_WEBHOOK_SECRET`,
    ///   `WORKOS_WEBHOOK_SECRET`, `ZOOM_WEBHOOK_SECRET`
    pub fn from_env() -> Result<Self, WebhookError> {
        let encryption_key = parse_encryption_key(&require_env("WEBHOOK_ENCRYPTION_KEY")?)?;

        let allow_http = std::env::var("WEBHOOK_ALLOW_HTTP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_endpoints_per_org = parse_env_or("WEBHOOK_MAX_ENDPOINTS_PER_ORG", 25)?;

        let mut worker = WorkerConfig::default();
        worker.concurrency = parse_env_or("WEBHOOK_WORKER_CONCURRENCY", worker.concurrency)?;

        let mut provider_secrets = HashMap::new();
        for (provider, var) in [
            (Provider::Stripe, "STRIPE_WEBHOOK_SECRET"),
            (Provider::Recall, "RECALL_WEBHOOK_SECRET"),
            (Provider::Workos, "WORKOS_WEBHOOK_SECRET"),
            (Provider::Zoom, "ZOOM_WEBHOOK_SECRET"),
        ] {
            if let Ok(secret) = std::env::var(var) {
                if !secret.is_empty() {
                    provider_secrets.insert(provider, secret);
                }
            }
        }

        Ok(Self {
            encryption_key,
            allow_http,
            max_endpoints_per_org,
            provider_secrets,
            worker,
        })
    }
}

/// Decode and validate a base64-encoded 32-byte encryption key.
pub fn parse_encryption_key(encoded: &str) -> Result<[u8; 32], WebhookError> {
    let bytes = BASE64.decode(encoded).map_err(|e| WebhookError::Config {
        var: "WEBHOOK_ENCRYPTION_KEY".to_string(),
        reason: format!("invalid base64: {e}"),
    })?;

    bytes.try_into().map_err(|_| WebhookError::Config {
        var: "WEBHOOK_ENCRYPTION_KEY".to_string(),
        reason: "key must be exactly 32 bytes".to_string(),
    })
}

fn require_env(var: &str) -> Result<String, WebhookError> {
    std::env::var(var).map_err(|_| WebhookError::Config {
        var: var.to_string(),
        reason: "not set".to_string(),
    })
}

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, WebhookError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| WebhookError::Config {
            var: var.to_string(),
            reason: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_defaults() {
        let w = WorkerConfig::default();
        assert_eq!(w.concurrency, 10);
        assert_eq!(w.request_timeout, Duration::from_secs(30));
        assert_eq!(w.max_attempts, 5);
        assert_eq!(w.disable_threshold, 10);
        assert_eq!(w.max_response_body_len, 1000);
        assert_eq!(w.idempotency_retention_days, 7);
    }

    #[test]
    fn test_parse_encryption_key_roundtrip() {
        let key = [7u8; 32];
        let encoded = BASE64.encode(key);
        assert_eq!(parse_encryption_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_parse_encryption_key_wrong_length() {
        let encoded = BASE64.encode([7u8; 16]);
        assert!(parse_encryption_key(&encoded).is_err());
    }

    #[test]
    fn test_parse_encryption_key_bad_base64() {
        assert!(parse_encryption_key("%%%not-base64%%%").is_err());
    }
}
