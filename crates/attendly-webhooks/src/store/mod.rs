//! Storage seams for the webhook system.
//!
//! The dispatcher, worker, and HTTP handlers talk to these traits rather than
//! to the database directly, so tests can run against the in-memory
//! implementations and production wires up the Postgres ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use attendly_db::models::{
    NewWebhookEndpoint, RecordDeliveryAttempt, UpdateWebhookEndpoint, WebhookDelivery,
    WebhookDeliveryStatus, WebhookEndpoint,
};

use crate::error::WebhookError;

mod memory;
mod postgres;

pub use memory::{InMemoryEndpointRegistry, InMemoryEventStore, InMemoryLedger};
pub use postgres::{PgEndpointRegistry, PgEventStore, PgLedger};

/// Registry of customer webhook endpoints.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    async fn create(&self, new: NewWebhookEndpoint) -> Result<WebhookEndpoint, WebhookError>;

    async fn find_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, WebhookError>;

    /// Resolve active endpoints subscribed to an event type.
    async fn find_active_subscribed(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, WebhookError>;

    async fn list(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookEndpoint>, WebhookError>;

    async fn count(&self, organization_id: Uuid) -> Result<i64, WebhookError>;

    async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        update: UpdateWebhookEndpoint,
    ) -> Result<Option<WebhookEndpoint>, WebhookError>;

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, WebhookError>;

    /// Replace the endpoint's encrypted signing secret.
    async fn set_secret(
        &self,
        organization_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<bool, WebhookError>;

    /// Record a successful delivery: zero the failure counter and stamp the
    /// last-triggered time.
    async fn mark_triggered(&self, id: Uuid) -> Result<(), WebhookError>;

    /// Atomically bump the consecutive-failure counter, returning the new
    /// value.
    async fn increment_failures(&self, id: Uuid) -> Result<i32, WebhookError>;

    /// Auto-disable after crossing the failure threshold.
    async fn disable_failed(&self, id: Uuid) -> Result<(), WebhookError>;

    /// Manual reactivation: back to active with a zeroed failure counter, in
    /// one atomic step.
    async fn reactivate(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, WebhookError>;
}

/// Ledger of delivery outcomes, one row per logical delivery.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Upsert the outcome of one attempt, keyed by delivery id.
    async fn record(&self, rec: RecordDeliveryAttempt) -> Result<WebhookDelivery, WebhookError>;

    async fn find_by_id(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookDelivery>, WebhookError>;

    async fn list_by_endpoint(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        limit: i64,
        offset: i64,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<Vec<WebhookDelivery>, WebhookError>;

    async fn count_by_endpoint(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<i64, WebhookError>;
}

/// Idempotency store for inbound provider events.
#[async_trait]
pub trait InboundEventStore: Send + Sync {
    /// First-writer-wins claim. Returns true when this caller owns the event,
    /// false when it was already claimed. A duplicate is normal control flow.
    async fn claim(
        &self,
        provider: &str,
        provider_event_id: &str,
        event_type: &str,
    ) -> Result<bool, WebhookError>;

    /// Read-only check with no claim side effect.
    async fn is_processed(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, WebhookError>;

    /// Delete records processed before the cutoff. Returns the number removed.
    async fn sweep_before(&self, cutoff: DateTime<Utc>) -> Result<u64, WebhookError>;
}
