//! Idempotency guard for inbound provider events.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::WebhookError;
use crate::store::InboundEventStore;

/// Default retention for processed-event records, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Claim-based exactly-once guard over an [`InboundEventStore`].
///
/// The claim happens before the event is handled, so two concurrent
/// arrivals of the same event cannot both win: the loser observes a
/// duplicate and skips handling.
pub struct IdempotencyService {
    store: Arc<dyn InboundEventStore>,
    retention_days: i64,
}

impl IdempotencyService {
    pub fn new(store: Arc<dyn InboundEventStore>) -> Self {
        Self {
            store,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Atomically claim an event. Returns true when the caller is the first
    /// to see it and should handle it; false when it is a duplicate.
    pub async fn claim(
        &self,
        provider: &str,
        provider_event_id: &str,
        event_type: &str,
    ) -> Result<bool, WebhookError> {
        let claimed = self
            .store
            .claim(provider, provider_event_id, event_type)
            .await?;

        if !claimed {
            tracing::debug!(
                target: "webhook_inbound",
                provider,
                provider_event_id,
                "duplicate inbound event skipped"
            );
        }

        Ok(claimed)
    }

    /// Read-only check with no claim side effect.
    pub async fn is_processed(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, WebhookError> {
        self.store.is_processed(provider, provider_event_id).await
    }

    /// Delete records older than the retention window. Returns the number
    /// removed.
    pub async fn sweep(&self) -> Result<u64, WebhookError> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        self.store.sweep_before(cutoff).await
    }
}
