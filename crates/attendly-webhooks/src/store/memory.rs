//! In-memory storage implementations.
//!
//! Used by integration tests and local development. Semantics mirror the
//! Postgres implementations, including the first-writer-wins idempotency
//! claim and the monotone attempt counter in the ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use attendly_db::models::{
    NewWebhookEndpoint, RecordDeliveryAttempt, UpdateWebhookEndpoint, WebhookDelivery,
    WebhookDeliveryStatus, WebhookEndpoint, WebhookEndpointStatus,
};

use crate::error::WebhookError;
use crate::store::{DeliveryLedger, EndpointRegistry, InboundEventStore};

#[derive(Default)]
pub struct InMemoryEndpointRegistry {
    endpoints: Mutex<HashMap<Uuid, WebhookEndpoint>>,
}

impl InMemoryEndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed endpoint, bypassing creation defaults.
    pub async fn insert(&self, endpoint: WebhookEndpoint) {
        self.endpoints.lock().await.insert(endpoint.id, endpoint);
    }
}

#[async_trait]
impl EndpointRegistry for InMemoryEndpointRegistry {
    async fn create(&self, new: NewWebhookEndpoint) -> Result<WebhookEndpoint, WebhookError> {
        let now = Utc::now();
        let endpoint = WebhookEndpoint {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            url: new.url,
            description: new.description,
            secret_encrypted: new.secret_encrypted,
            event_types: new.event_types,
            status: WebhookEndpointStatus::Active,
            custom_headers: Json(new.custom_headers),
            consecutive_failures: 0,
            last_triggered_at: None,
            created_at: now,
            updated_at: now,
        };
        self.endpoints
            .lock()
            .await
            .insert(endpoint.id, endpoint.clone());
        Ok(endpoint)
    }

    async fn find_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, WebhookError> {
        Ok(self
            .endpoints
            .lock()
            .await
            .get(&id)
            .filter(|ep| ep.organization_id == organization_id)
            .cloned())
    }

    async fn find_active_subscribed(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, WebhookError> {
        let mut matches: Vec<WebhookEndpoint> = self
            .endpoints
            .lock()
            .await
            .values()
            .filter(|ep| {
                ep.organization_id == organization_id
                    && ep.is_active()
                    && ep.is_subscribed_to(event_type)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|ep| ep.created_at);
        Ok(matches)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookEndpoint>, WebhookError> {
        let mut all: Vec<WebhookEndpoint> = self
            .endpoints
            .lock()
            .await
            .values()
            .filter(|ep| ep.organization_id == organization_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, organization_id: Uuid) -> Result<i64, WebhookError> {
        Ok(self
            .endpoints
            .lock()
            .await
            .values()
            .filter(|ep| ep.organization_id == organization_id)
            .count() as i64)
    }

    async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        update: UpdateWebhookEndpoint,
    ) -> Result<Option<WebhookEndpoint>, WebhookError> {
        let mut endpoints = self.endpoints.lock().await;
        let Some(ep) = endpoints
            .get_mut(&id)
            .filter(|ep| ep.organization_id == organization_id)
        else {
            return Ok(None);
        };

        if let Some(url) = update.url {
            ep.url = url;
        }
        if let Some(description) = update.description {
            ep.description = Some(description);
        }
        if let Some(event_types) = update.event_types {
            ep.event_types = event_types;
        }
        if let Some(custom_headers) = update.custom_headers {
            ep.custom_headers = Json(custom_headers);
        }
        if let Some(status) = update.status {
            ep.status = status;
        }
        ep.updated_at = Utc::now();
        Ok(Some(ep.clone()))
    }

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, WebhookError> {
        let mut endpoints = self.endpoints.lock().await;
        let matched = endpoints
            .get(&id)
            .is_some_and(|ep| ep.organization_id == organization_id);
        if matched {
            endpoints.remove(&id);
        }
        Ok(matched)
    }

    async fn set_secret(
        &self,
        organization_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<bool, WebhookError> {
        let mut endpoints = self.endpoints.lock().await;
        match endpoints
            .get_mut(&id)
            .filter(|ep| ep.organization_id == organization_id)
        {
            Some(ep) => {
                ep.secret_encrypted = secret_encrypted.to_string();
                ep.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_triggered(&self, id: Uuid) -> Result<(), WebhookError> {
        if let Some(ep) = self.endpoints.lock().await.get_mut(&id) {
            ep.consecutive_failures = 0;
            ep.last_triggered_at = Some(Utc::now());
            ep.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn increment_failures(&self, id: Uuid) -> Result<i32, WebhookError> {
        let mut endpoints = self.endpoints.lock().await;
        let ep = endpoints
            .get_mut(&id)
            .ok_or(WebhookError::EndpointNotFound)?;
        ep.consecutive_failures += 1;
        ep.updated_at = Utc::now();
        Ok(ep.consecutive_failures)
    }

    async fn disable_failed(&self, id: Uuid) -> Result<(), WebhookError> {
        if let Some(ep) = self.endpoints.lock().await.get_mut(&id) {
            ep.status = WebhookEndpointStatus::Failed;
            ep.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn reactivate(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, WebhookError> {
        let mut endpoints = self.endpoints.lock().await;
        let Some(ep) = endpoints
            .get_mut(&id)
            .filter(|ep| ep.organization_id == organization_id)
        else {
            return Ok(None);
        };
        ep.status = WebhookEndpointStatus::Active;
        ep.consecutive_failures = 0;
        ep.updated_at = Utc::now();
        Ok(Some(ep.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    deliveries: Mutex<HashMap<Uuid, WebhookDelivery>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All ledger rows, for test assertions.
    pub async fn all(&self) -> Vec<WebhookDelivery> {
        self.deliveries.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryLedger {
    async fn record(&self, rec: RecordDeliveryAttempt) -> Result<WebhookDelivery, WebhookError> {
        let mut deliveries = self.deliveries.lock().await;
        let now = Utc::now();
        let entry = deliveries
            .entry(rec.delivery_id)
            .and_modify(|d| {
                d.status = rec.status;
                d.attempts = d.attempts.max(rec.attempt);
                d.response_status = rec.response_status;
                d.response_body = rec.response_body.clone();
                d.error_message = rec.error_message.clone();
                d.last_attempt_at = Some(now);
            })
            .or_insert_with(|| WebhookDelivery {
                id: rec.delivery_id,
                organization_id: rec.organization_id,
                endpoint_id: rec.endpoint_id,
                event_type: rec.event_type.clone(),
                payload: rec.payload.clone(),
                status: rec.status,
                attempts: rec.attempt,
                response_status: rec.response_status,
                response_body: rec.response_body.clone(),
                error_message: rec.error_message.clone(),
                last_attempt_at: Some(now),
                created_at: now,
            });
        Ok(entry.clone())
    }

    async fn find_by_id(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WebhookDelivery>, WebhookError> {
        Ok(self
            .deliveries
            .lock()
            .await
            .get(&id)
            .filter(|d| d.organization_id == organization_id && d.endpoint_id == endpoint_id)
            .cloned())
    }

    async fn list_by_endpoint(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        limit: i64,
        offset: i64,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        let mut matches: Vec<WebhookDelivery> = self
            .deliveries
            .lock()
            .await
            .values()
            .filter(|d| {
                d.organization_id == organization_id
                    && d.endpoint_id == endpoint_id
                    && status.map_or(true, |s| d.status == s)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_endpoint(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<i64, WebhookError> {
        Ok(self
            .deliveries
            .lock()
            .await
            .values()
            .filter(|d| {
                d.organization_id == organization_id
                    && d.endpoint_id == endpoint_id
                    && status.map_or(true, |s| d.status == s)
            })
            .count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryEventStore {
    processed: Mutex<HashMap<(String, String), (String, DateTime<Utc>)>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of claimed events, for test assertions.
    pub async fn len(&self) -> usize {
        self.processed.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processed.lock().await.is_empty()
    }
}

#[async_trait]
impl InboundEventStore for InMemoryEventStore {
    async fn claim(
        &self,
        provider: &str,
        provider_event_id: &str,
        event_type: &str,
    ) -> Result<bool, WebhookError> {
        let mut processed = self.processed.lock().await;
        let key = (provider.to_string(), provider_event_id.to_string());
        if processed.contains_key(&key) {
            return Ok(false);
        }
        processed.insert(key, (event_type.to_string(), Utc::now()));
        Ok(true)
    }

    async fn is_processed(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, WebhookError> {
        let key = (provider.to_string(), provider_event_id.to_string());
        Ok(self.processed.lock().await.contains_key(&key))
    }

    async fn sweep_before(&self, cutoff: DateTime<Utc>) -> Result<u64, WebhookError> {
        let mut processed = self.processed.lock().await;
        let before = processed.len();
        processed.retain(|_, (_, at)| *at >= cutoff);
        Ok((before - processed.len()) as u64)
    }
}
