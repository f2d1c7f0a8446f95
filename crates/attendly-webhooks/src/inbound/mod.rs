//! Inbound provider webhooks.
//!
//! Each upstream provider signs its webhooks differently; an adapter per
//! provider hides the scheme behind one verification contract. Verification
//! failures are deliberately indistinguishable to the caller (generic 401),
//! and every verified event passes through the idempotency claim before it
//! is handled.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::error::WebhookError;
use crate::idempotency::IdempotencyService;

mod recall;
mod stripe;
mod workos;
mod zoom;

pub use recall::RecallVerifier;
pub use stripe::StripeVerifier;
pub use workos::WorkosVerifier;
pub use zoom::ZoomVerifier;

/// Upstream webhook providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Billing events, `t=..,v1=..` timestamped HMAC.
    Stripe,
    /// Meeting bot events, Standard Webhooks scheme.
    Recall,
    /// Directory sync events, `sha256=<hex>` HMAC over the raw body.
    Workos,
    /// Meeting lifecycle events, shared verification token.
    Zoom,
}

impl Provider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Recall => "recall",
            Self::Workos => "workos",
            Self::Zoom => "zoom",
        }
    }
}

impl FromStr for Provider {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "recall" => Ok(Self::Recall),
            "workos" => Ok(Self::Workos),
            "zoom" => Ok(Self::Zoom),
            other => Err(WebhookError::UnknownProvider(other.to_string())),
        }
    }
}

/// Provider-assigned identity of an inbound event, used as the idempotency
/// key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    pub event_id: String,
    pub event_type: String,
}

/// Per-provider signature scheme adapter.
pub trait ProviderVerifier: Send + Sync {
    /// Verify the request against the provider's scheme. Any failure mode
    /// (missing header, malformed header, bad digest, stale timestamp)
    /// returns false.
    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> bool;

    /// Extract the provider's event identity from a verified request.
    fn event_ref(&self, headers: &HeaderMap, body: &[u8]) -> Option<EventRef>;
}

/// Lookup table from provider to its verifier.
pub struct VerifierRegistry {
    verifiers: HashMap<Provider, Box<dyn ProviderVerifier>>,
}

impl VerifierRegistry {
    /// Registry with every supported provider wired to its adapter.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut verifiers: HashMap<Provider, Box<dyn ProviderVerifier>> = HashMap::new();
        verifiers.insert(Provider::Stripe, Box::new(StripeVerifier));
        verifiers.insert(Provider::Recall, Box::new(RecallVerifier));
        verifiers.insert(Provider::Workos, Box::new(WorkosVerifier));
        verifiers.insert(Provider::Zoom, Box::new(ZoomVerifier));
        Self { verifiers }
    }

    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<&dyn ProviderVerifier> {
        self.verifiers.get(&provider).map(Box::as_ref)
    }
}

impl Default for VerifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Downstream handler for verified, deduplicated inbound events.
#[async_trait]
pub trait InboundEventHandler: Send + Sync {
    async fn handle(
        &self,
        provider: Provider,
        event: &EventRef,
        payload: &serde_json::Value,
    ) -> Result<(), WebhookError>;
}

/// Outcome of processing an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// First arrival; the event was handled.
    Processed,
    /// Already claimed earlier; the handler was not invoked again.
    Duplicate,
}

/// Verify → claim → handle pipeline for inbound provider requests.
pub struct InboundProcessor {
    registry: VerifierRegistry,
    secrets: HashMap<Provider, String>,
    idempotency: Arc<IdempotencyService>,
    handler: Arc<dyn InboundEventHandler>,
}

impl InboundProcessor {
    pub fn new(
        registry: VerifierRegistry,
        secrets: HashMap<Provider, String>,
        idempotency: Arc<IdempotencyService>,
        handler: Arc<dyn InboundEventHandler>,
    ) -> Self {
        Self {
            registry,
            secrets,
            idempotency,
            handler,
        }
    }

    /// Process one inbound request end to end.
    ///
    /// Unknown providers are a 404; every verification failure collapses to
    /// [`WebhookError::Unauthorized`] so callers cannot probe which check
    /// failed.
    pub async fn process(
        &self,
        provider: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<InboundOutcome, WebhookError> {
        let provider = Provider::from_str(provider)?;

        let verifier = self
            .registry
            .get(provider)
            .ok_or_else(|| WebhookError::UnknownProvider(provider.as_str().to_string()))?;

        // A provider with no configured secret cannot be verified.
        let secret = self
            .secrets
            .get(&provider)
            .ok_or(WebhookError::Unauthorized)?;

        if !verifier.verify(headers, body, secret) {
            tracing::warn!(
                target: "webhook_inbound",
                provider = provider.as_str(),
                "inbound signature verification failed"
            );
            return Err(WebhookError::Unauthorized);
        }

        let event = verifier
            .event_ref(headers, body)
            .ok_or_else(|| WebhookError::Validation("missing event identity".to_string()))?;

        if !self
            .idempotency
            .claim(provider.as_str(), &event.event_id, &event.event_type)
            .await?
        {
            return Ok(InboundOutcome::Duplicate);
        }

        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::Validation(format!("invalid JSON body: {e}")))?;

        self.handler.handle(provider, &event, &payload).await?;

        tracing::info!(
            target: "webhook_inbound",
            provider = provider.as_str(),
            event_id = %event.event_id,
            event_type = %event.event_type,
            "inbound event processed"
        );

        Ok(InboundOutcome::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("stripe".parse::<Provider>().unwrap(), Provider::Stripe);
        assert_eq!("recall".parse::<Provider>().unwrap(), Provider::Recall);
        assert_eq!("workos".parse::<Provider>().unwrap(), Provider::Workos);
        assert_eq!("zoom".parse::<Provider>().unwrap(), Provider::Zoom);
        assert!("github".parse::<Provider>().is_err());
        assert!("".parse::<Provider>().is_err());
    }

    #[test]
    fn test_registry_covers_all_providers() {
        let registry = VerifierRegistry::with_defaults();
        for provider in [
            Provider::Stripe,
            Provider::Recall,
            Provider::Workos,
            Provider::Zoom,
        ] {
            assert!(registry.get(provider).is_some(), "{provider:?} missing");
        }
    }
}
