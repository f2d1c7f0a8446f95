//! Postgres-backed storage implementations, delegating to the `attendly-db`
//! models.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use attendly_db::models::{
    NewWebhookEndpoint, ProcessedInboundEvent, RecordDeliveryAttempt, UpdateWebhookEndpoint,
    WebhookDelivery, WebhookDeliveryStatus, WebhookEndpoint,
};

use crate::error::WebhookError;
use crate::store::{DeliveryLedger, EndpointRegistry, InboundEventStore};

#[derive(Clone)]
pub struct PgEndpointRegistry {
    pool: PgPool,
}

impl PgEndpointRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EndpointRegistry for PgEndpointRegistry {
    async fn create(&self, new: NewWebhookEndpoint) -> Result<WebhookEndpoint, WebhookError> {
        Ok(WebhookEndpoint::create(&self.pool, new).await?)
    }

    async fn find_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, WebhookError> {
        Ok(WebhookEndpoint::find_by_id(&self.pool, organization_id, id).await?)
    }

    async fn find_active_subscribed(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, WebhookError> {
        Ok(WebhookEndpoint::find_active_subscribed(&self.pool, organization_id, event_type).await?)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookEndpoint>, WebhookError> {
        Ok(WebhookEndpoint::list_by_organization(&self.pool, organization_id, limit, offset).await?)
    }

    async fn count(&self, organization_id: Uuid) -> Result<i64, WebhookError> {
        Ok(WebhookEndpoint::count_by_organization(&self.pool, organization_id).await?)
    }

    async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        update: UpdateWebhookEndpoint,
    ) -> Result<Option<WebhookEndpoint>, WebhookError> {
        Ok(WebhookEndpoint::update(&self.pool, organization_id, id, update).await?)
    }

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, WebhookError> {
        Ok(WebhookEndpoint::delete(&self.pool, organization_id, id).await?)
    }

    async fn set_secret(
        &self,
        organization_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<bool, WebhookError> {
        Ok(WebhookEndpoint::set_secret(&self.pool, organization_id, id, secret_encrypted).await?)
    }

    async fn mark_triggered(&self, id: Uuid) -> Result<(), WebhookError> {
        Ok(WebhookEndpoint::mark_triggered(&self.pool, id).await?)
    }

    async fn increment_failures(&self, id: Uuid) -> Result<i32, WebhookError> {
        Ok(WebhookEndpoint::increment_failures(&self.pool, id).await?)
    }

    async fn disable_failed(&self, id: Uuid) -> Result<(), WebhookError> {
        Ok(WebhookEndpoint::disable_failed(&self.pool, id).await?)
    }

    async fn reactivate(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, WebhookError> {
        Ok(WebhookEndpoint::reactivate(&self.pool, organization_id, id).await?)
    }
}

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLedger for PgLedger {
    async fn record(&self, rec: RecordDeliveryAttempt) -> Result<WebhookDelivery, WebhookError> {
        Ok(WebhookDelivery::record(&self.pool, rec).await?)
    }

    async fn find_by_id(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookDelivery>, WebhookError> {
        Ok(WebhookDelivery::find_by_id(&self.pool, organization_id, endpoint_id, id).await?)
    }

    async fn list_by_endpoint(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        limit: i64,
        offset: i64,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        Ok(WebhookDelivery::list_by_endpoint(
            &self.pool,
            organization_id,
            endpoint_id,
            limit,
            offset,
            status,
        )
        .await?)
    }

    async fn count_by_endpoint(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<i64, WebhookError> {
        Ok(
            WebhookDelivery::count_by_endpoint(&self.pool, organization_id, endpoint_id, status)
                .await?,
        )
    }
}

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboundEventStore for PgEventStore {
    async fn claim(
        &self,
        provider: &str,
        provider_event_id: &str,
        event_type: &str,
    ) -> Result<bool, WebhookError> {
        Ok(ProcessedInboundEvent::claim(&self.pool, provider, provider_event_id, event_type)
            .await?)
    }

    async fn is_processed(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, WebhookError> {
        Ok(ProcessedInboundEvent::is_processed(&self.pool, provider, provider_event_id).await?)
    }

    async fn sweep_before(&self, cutoff: DateTime<Utc>) -> Result<u64, WebhookError> {
        Ok(ProcessedInboundEvent::sweep_before(&self.pool, cutoff).await?)
    }
}
