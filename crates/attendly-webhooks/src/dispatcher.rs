//! Event dispatch: fan an event out to subscribed endpoints as queued
//! delivery jobs, and schedule retries for failed attempts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use attendly_db::models::{DeliveryJob, NewDeliveryJob, WebhookEndpoint};

use crate::error::WebhookError;
use crate::models::WebhookEventType;
use crate::queue::JobQueue;
use crate::store::EndpointRegistry;

/// Maximum delivery attempts per logical delivery.
pub const MAX_RETRY_ATTEMPTS: i32 = 5;

/// Backoff schedule in milliseconds, indexed by the number of the attempt
/// that just failed (1-based, capped at the last entry):
/// 1s, 5s, 30s, 5min, 1h.
pub const RETRY_DELAYS_MS: [i64; 5] = [1_000, 5_000, 30_000, 300_000, 3_600_000];

/// Delay before the retry that follows failed attempt `attempt`.
#[must_use]
pub fn retry_delay(attempt: i32) -> Duration {
    let index = (attempt.max(1) as usize - 1).min(RETRY_DELAYS_MS.len() - 1);
    Duration::milliseconds(RETRY_DELAYS_MS[index])
}

/// Fans events out to endpoint delivery jobs.
pub struct Dispatcher {
    endpoints: Arc<dyn EndpointRegistry>,
    queue: Arc<dyn JobQueue>,
}

impl Dispatcher {
    pub fn new(endpoints: Arc<dyn EndpointRegistry>, queue: Arc<dyn JobQueue>) -> Self {
        Self { endpoints, queue }
    }

    /// Publish an event to every active endpoint subscribed to it. Each
    /// matching endpoint gets its own delivery job with a fresh delivery id.
    /// Returns the number of deliveries enqueued.
    pub async fn publish(
        &self,
        organization_id: Uuid,
        event: WebhookEventType,
        data: serde_json::Value,
    ) -> Result<usize, WebhookError> {
        let subscribed = self
            .endpoints
            .find_active_subscribed(organization_id, event.as_str())
            .await?;

        for endpoint in &subscribed {
            self.enqueue_first_attempt(endpoint, event.as_str(), data.clone())
                .await?;
        }

        tracing::debug!(
            target: "webhook_delivery",
            organization_id = %organization_id,
            event_type = event.as_str(),
            endpoints = subscribed.len(),
            "enqueued webhook deliveries"
        );

        Ok(subscribed.len())
    }

    /// Enqueue a delivery to one specific endpoint, bypassing the
    /// subscription filter. Used for test deliveries. Returns the delivery id.
    pub async fn dispatch_to_endpoint(
        &self,
        endpoint: &WebhookEndpoint,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<Uuid, WebhookError> {
        let job = self.enqueue_first_attempt(endpoint, event_type, data).await?;
        Ok(job.delivery_id)
    }

    async fn enqueue_first_attempt(
        &self,
        endpoint: &WebhookEndpoint,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<DeliveryJob, WebhookError> {
        self.queue
            .enqueue(NewDeliveryJob {
                delivery_id: Uuid::new_v4(),
                endpoint_id: endpoint.id,
                organization_id: endpoint.organization_id,
                event_type: event_type.to_string(),
                payload: data,
                attempt: 1,
                run_at: Utc::now(),
            })
            .await
    }

    /// Schedule the retry that follows a failed attempt. Returns false when
    /// `max_attempts` is reached and no retry was enqueued.
    pub async fn schedule_retry(
        &self,
        failed: &DeliveryJob,
        max_attempts: i32,
    ) -> Result<bool, WebhookError> {
        let next_attempt = failed.attempt + 1;
        if next_attempt > max_attempts {
            return Ok(false);
        }

        let delay = retry_delay(failed.attempt);
        self.queue
            .enqueue(NewDeliveryJob {
                delivery_id: failed.delivery_id,
                endpoint_id: failed.endpoint_id,
                organization_id: failed.organization_id,
                event_type: failed.event_type.clone(),
                payload: failed.payload.clone(),
                attempt: next_attempt,
                run_at: Utc::now() + delay,
            })
            .await?;

        tracing::debug!(
            target: "webhook_delivery",
            delivery_id = %failed.delivery_id,
            endpoint_id = %failed.endpoint_id,
            attempt = next_attempt,
            delay_ms = delay.num_milliseconds(),
            "scheduled delivery retry"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_schedule() {
        assert_eq!(retry_delay(1).num_milliseconds(), 1_000);
        assert_eq!(retry_delay(2).num_milliseconds(), 5_000);
        assert_eq!(retry_delay(3).num_milliseconds(), 30_000);
        assert_eq!(retry_delay(4).num_milliseconds(), 300_000);
        assert_eq!(retry_delay(5).num_milliseconds(), 3_600_000);
    }

    #[test]
    fn test_retry_delay_caps_at_last_entry() {
        assert_eq!(retry_delay(6).num_milliseconds(), 3_600_000);
        assert_eq!(retry_delay(10).num_milliseconds(), 3_600_000);
    }

    #[test]
    fn test_retry_delay_clamps_low_attempts() {
        assert_eq!(retry_delay(0).num_milliseconds(), 1_000);
        assert_eq!(retry_delay(-3).num_milliseconds(), 1_000);
    }
}
