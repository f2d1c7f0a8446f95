//! Delivery worker pool.
//!
//! Polls the job queue for due delivery attempts and executes them with
//! bounded concurrency. The worker also runs two background maintenance
//! tasks on their own intervals: releasing stale job claims and sweeping
//! expired idempotency records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tokio::sync::Semaphore;

use attendly_db::models::{DeliveryJob, RecordDeliveryAttempt, WebhookDeliveryStatus};

use crate::config::WorkerConfig;
use crate::crypto;
use crate::dispatcher::Dispatcher;
use crate::error::WebhookError;
use crate::models::WebhookPayload;
use crate::queue::JobQueue;
use crate::store::{DeliveryLedger, EndpointRegistry, InboundEventStore};

const USER_AGENT: &str = concat!("Attendly-Webhooks/", env!("CARGO_PKG_VERSION"));

/// Executes queued delivery attempts against customer endpoints.
pub struct DeliveryWorker {
    endpoints: Arc<dyn EndpointRegistry>,
    ledger: Arc<dyn DeliveryLedger>,
    queue: Arc<dyn JobQueue>,
    events: Arc<dyn InboundEventStore>,
    dispatcher: Arc<Dispatcher>,
    config: WorkerConfig,
    encryption_key: [u8; 32],
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    shutdown: AtomicBool,
}

impl DeliveryWorker {
    pub fn new(
        endpoints: Arc<dyn EndpointRegistry>,
        ledger: Arc<dyn DeliveryLedger>,
        queue: Arc<dyn JobQueue>,
        events: Arc<dyn InboundEventStore>,
        dispatcher: Arc<Dispatcher>,
        config: WorkerConfig,
        encryption_key: [u8; 32],
    ) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WebhookError::Internal(format!("HTTP client build failed: {e}")))?;

        let semaphore = Arc::new(Semaphore::new(config.concurrency));

        Ok(Self {
            endpoints,
            ledger,
            queue,
            events,
            dispatcher,
            config,
            encryption_key,
            client,
            semaphore,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Request a graceful stop. The run loop finishes in-flight deliveries
    /// before returning.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Run the worker loop until [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: Arc<Self>) {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut stale = tokio::time::interval(self.config.stale_release_interval);
        let mut sweep = tokio::time::interval(self.config.sweep_interval);

        tracing::info!(
            target: "webhook_delivery",
            concurrency = self.config.concurrency,
            "delivery worker started"
        );

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = Arc::clone(&self).poll_and_execute().await {
                        tracing::error!(target: "webhook_delivery", error = %e, "queue poll failed");
                    }
                }
                _ = stale.tick() => {
                    self.release_stale_claims().await;
                }
                _ = sweep.tick() => {
                    self.sweep_idempotency_records().await;
                }
            }
        }

        // Drain: wait until every in-flight delivery has released its permit.
        let _ = self
            .semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;
        tracing::info!(target: "webhook_delivery", "delivery worker stopped");
    }

    /// Claim due jobs up to the free concurrency and execute each in its own
    /// task.
    async fn poll_and_execute(self: Arc<Self>) -> Result<(), WebhookError> {
        let free = self.semaphore.available_permits();
        if free == 0 {
            return Ok(());
        }

        let jobs = self.queue.claim_due(free as i64).await?;
        for job in jobs {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Ok(()),
            };

            let worker = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = worker.process_job(job).await {
                    tracing::error!(
                        target: "webhook_delivery",
                        error = %e,
                        "delivery attempt failed to execute"
                    );
                }
            });
        }

        Ok(())
    }

    async fn release_stale_claims(&self) {
        let cutoff = Utc::now()
            - Duration::from_std(self.config.stale_claim_after).unwrap_or(Duration::zero());
        match self.queue.release_stale(cutoff).await {
            Ok(0) => {}
            Ok(n) => {
                tracing::warn!(target: "webhook_delivery", released = n, "released stale job claims");
            }
            Err(e) => {
                tracing::error!(target: "webhook_delivery", error = %e, "stale claim release failed");
            }
        }
    }

    async fn sweep_idempotency_records(&self) {
        let cutoff = Utc::now() - Duration::days(self.config.idempotency_retention_days);
        match self.events.sweep_before(cutoff).await {
            Ok(0) => {}
            Ok(n) => {
                tracing::debug!(target: "webhook_delivery", swept = n, "swept expired idempotency records");
            }
            Err(e) => {
                tracing::error!(target: "webhook_delivery", error = %e, "idempotency sweep failed");
            }
        }
    }

    /// Execute one claimed delivery attempt end to end.
    ///
    /// Public so tests can drive attempts directly without the poll loop.
    pub async fn process_job(&self, job: DeliveryJob) -> Result<(), WebhookError> {
        let endpoint = self
            .endpoints
            .find_by_id(job.organization_id, job.endpoint_id)
            .await?;

        // An endpoint that was deleted, paused, or auto-disabled after this
        // job was enqueued: drop the job without a ledger record.
        let Some(endpoint) = endpoint.filter(|ep| ep.is_active()) else {
            tracing::debug!(
                target: "webhook_delivery",
                delivery_id = %job.delivery_id,
                endpoint_id = %job.endpoint_id,
                "dropping job for missing or non-active endpoint"
            );
            self.queue.complete(job.id).await?;
            return Ok(());
        };

        let secret = crypto::decrypt_secret(&endpoint.secret_encrypted, &self.encryption_key)?;

        let payload = WebhookPayload {
            id: job.delivery_id,
            event: job.event_type.clone(),
            timestamp: Utc::now(),
            data: job.payload.clone(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| WebhookError::Internal(format!("payload serialization failed: {e}")))?;
        let signature = crypto::sign_payload(&secret, &body);

        let headers = build_headers(&job, &signature, &endpoint.custom_headers)?;

        let outcome = self
            .client
            .post(&endpoint.url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        match outcome {
            Ok(response) if response.status().is_success() => {
                self.handle_success(&job, response).await
            }
            Ok(response) => {
                let status = response.status().as_u16() as i16;
                let body = response.text().await.unwrap_or_default();
                self.handle_failure(
                    &job,
                    Some(status),
                    Some(truncate_chars(&body, self.config.max_response_body_len)),
                    format!("endpoint returned HTTP {status}"),
                )
                .await
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {e}")
                };
                self.handle_failure(&job, None, None, reason).await
            }
        }
    }

    async fn handle_success(
        &self,
        job: &DeliveryJob,
        response: reqwest::Response,
    ) -> Result<(), WebhookError> {
        let status = response.status().as_u16() as i16;
        let body = response.text().await.unwrap_or_default();

        self.ledger
            .record(RecordDeliveryAttempt {
                delivery_id: job.delivery_id,
                organization_id: job.organization_id,
                endpoint_id: job.endpoint_id,
                event_type: job.event_type.clone(),
                payload: job.payload.clone(),
                status: WebhookDeliveryStatus::Success,
                attempt: job.attempt,
                response_status: Some(status),
                response_body: Some(truncate_chars(&body, self.config.max_response_body_len)),
                error_message: None,
            })
            .await?;

        self.endpoints.mark_triggered(job.endpoint_id).await?;
        self.queue.complete(job.id).await?;

        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %job.delivery_id,
            endpoint_id = %job.endpoint_id,
            event_type = %job.event_type,
            attempt = job.attempt,
            response_status = status,
            "webhook delivered"
        );

        Ok(())
    }

    async fn handle_failure(
        &self,
        job: &DeliveryJob,
        response_status: Option<i16>,
        response_body: Option<String>,
        reason: String,
    ) -> Result<(), WebhookError> {
        let exhausted = job.attempt >= self.config.max_attempts;
        let status = if exhausted {
            WebhookDeliveryStatus::Failed
        } else {
            WebhookDeliveryStatus::Pending
        };

        self.ledger
            .record(RecordDeliveryAttempt {
                delivery_id: job.delivery_id,
                organization_id: job.organization_id,
                endpoint_id: job.endpoint_id,
                event_type: job.event_type.clone(),
                payload: job.payload.clone(),
                status,
                attempt: job.attempt,
                response_status,
                response_body,
                error_message: Some(reason.clone()),
            })
            .await?;

        let failures = self.endpoints.increment_failures(job.endpoint_id).await?;

        if failures >= self.config.disable_threshold {
            self.endpoints.disable_failed(job.endpoint_id).await?;
            tracing::warn!(
                target: "webhook_delivery",
                endpoint_id = %job.endpoint_id,
                consecutive_failures = failures,
                "endpoint auto-disabled after consecutive failures"
            );
        } else if !exhausted {
            self.dispatcher
                .schedule_retry(job, self.config.max_attempts)
                .await?;
        }

        self.queue.complete(job.id).await?;

        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %job.delivery_id,
            endpoint_id = %job.endpoint_id,
            event_type = %job.event_type,
            attempt = job.attempt,
            exhausted,
            reason = %reason,
            "webhook delivery attempt failed"
        );

        Ok(())
    }
}

/// Build the outbound header set: standard delivery headers first, then the
/// endpoint's custom headers. Custom headers cannot override the standard
/// ones.
fn build_headers(
    job: &DeliveryJob,
    signature: &str,
    custom: &std::collections::HashMap<String, String>,
) -> Result<HeaderMap, WebhookError> {
    let mut headers = HeaderMap::new();

    for (name, value) in custom {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| WebhookError::Validation(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| WebhookError::Validation("invalid header value".to_string()))?;
        headers.insert(name, value);
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    insert_delivery_header(&mut headers, "x-webhook-id", &job.delivery_id.to_string())?;
    insert_delivery_header(&mut headers, "x-webhook-signature", signature)?;
    insert_delivery_header(&mut headers, "x-webhook-event", &job.event_type)?;

    Ok(headers)
}

fn insert_delivery_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), WebhookError> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| WebhookError::Internal(format!("invalid {name} header value")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn job() -> DeliveryJob {
        DeliveryJob {
            id: Uuid::new_v4(),
            delivery_id: Uuid::new_v4(),
            endpoint_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            event_type: "meeting.ended".to_string(),
            payload: serde_json::json!({}),
            attempt: 1,
            run_at: Utc::now(),
            claimed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("", 3), "");
        // Multibyte chars are counted as one character each
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_build_headers_standard_set() {
        let job = job();
        let headers = build_headers(&job, "t=1,v1=abc", &HashMap::new()).unwrap();

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(
            headers.get("x-webhook-id").unwrap(),
            &job.delivery_id.to_string()
        );
        assert_eq!(headers.get("x-webhook-signature").unwrap(), "t=1,v1=abc");
        assert_eq!(headers.get("x-webhook-event").unwrap(), "meeting.ended");
    }

    #[test]
    fn test_custom_headers_cannot_override_standard() {
        let mut custom = HashMap::new();
        custom.insert("X-Webhook-Signature".to_string(), "forged".to_string());
        custom.insert("X-Tenant".to_string(), "acme".to_string());

        let headers = build_headers(&job(), "t=1,v1=abc", &custom).unwrap();
        assert_eq!(headers.get("x-webhook-signature").unwrap(), "t=1,v1=abc");
        assert_eq!(headers.get("x-tenant").unwrap(), "acme");
    }

    #[test]
    fn test_invalid_custom_header_rejected() {
        let mut custom = HashMap::new();
        custom.insert("bad header".to_string(), "value".to_string());
        assert!(build_headers(&job(), "t=1,v1=abc", &custom).is_err());
    }
}
