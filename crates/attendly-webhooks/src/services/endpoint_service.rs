//! Webhook endpoint CRUD service.
//!
//! Business logic for registering, listing, updating, and deleting webhook
//! endpoints: URL validation with SSRF protection, secret generation and
//! encryption, per-organization limits, event type validation, reactivation,
//! secret rotation, and test deliveries.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use attendly_db::models::{
    NewWebhookEndpoint, UpdateWebhookEndpoint, WebhookDeliveryStatus, WebhookEndpoint,
    WebhookEndpointStatus,
};

use crate::crypto;
use crate::dispatcher::Dispatcher;
use crate::error::WebhookError;
use crate::models::{
    CreateWebhookEndpointRequest, ListDeliveriesQuery, ListEndpointsQuery, TestDeliveryResponse,
    UpdateWebhookEndpointRequest, WebhookDeliveryListResponse, WebhookDeliveryResponse,
    WebhookEndpointCreatedResponse, WebhookEndpointListResponse, WebhookEndpointResponse,
};
use crate::store::{DeliveryLedger, EndpointRegistry};
use crate::validation;

/// Default maximum endpoints per organization.
pub const DEFAULT_MAX_ENDPOINTS: i64 = 25;

/// Event type used for customer-triggered test deliveries.
pub const TEST_EVENT_TYPE: &str = "endpoint.test";

/// Service for webhook endpoint operations.
pub struct EndpointService {
    endpoints: Arc<dyn EndpointRegistry>,
    ledger: Arc<dyn DeliveryLedger>,
    dispatcher: Arc<Dispatcher>,
    encryption_key: [u8; 32],
    max_endpoints: i64,
    allow_http: bool,
}

impl EndpointService {
    #[must_use]
    pub fn new(
        endpoints: Arc<dyn EndpointRegistry>,
        ledger: Arc<dyn DeliveryLedger>,
        dispatcher: Arc<Dispatcher>,
        encryption_key: [u8; 32],
    ) -> Self {
        Self {
            endpoints,
            ledger,
            dispatcher,
            encryption_key,
            max_endpoints: DEFAULT_MAX_ENDPOINTS,
            allow_http: false,
        }
    }

    /// Set the maximum endpoints per organization.
    #[must_use]
    pub fn with_max_endpoints(mut self, max: i64) -> Self {
        self.max_endpoints = max;
        self
    }

    /// Allow HTTP URLs (for development/testing).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Register a new endpoint. The generated signing secret is returned in
    /// plaintext exactly once.
    pub async fn create_endpoint(
        &self,
        organization_id: Uuid,
        request: CreateWebhookEndpointRequest,
    ) -> Result<WebhookEndpointCreatedResponse, WebhookError> {
        validation::validate_webhook_url(&request.url, self.allow_http)?;
        validation::validate_event_types(&request.event_types)?;

        let count = self.endpoints.count(organization_id).await?;
        if count >= self.max_endpoints {
            return Err(WebhookError::EndpointLimitExceeded {
                limit: self.max_endpoints,
            });
        }

        let secret = crypto::generate_endpoint_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let endpoint = self
            .endpoints
            .create(NewWebhookEndpoint {
                organization_id,
                url: request.url,
                description: request.description,
                secret_encrypted,
                event_types: request.event_types,
                custom_headers: request.custom_headers,
            })
            .await?;

        tracing::info!(
            target: "webhook_delivery",
            organization_id = %organization_id,
            endpoint_id = %endpoint.id,
            "webhook endpoint registered"
        );

        Ok(WebhookEndpointCreatedResponse {
            endpoint: endpoint_to_response(endpoint),
            secret,
        })
    }

    /// List an organization's endpoints with pagination.
    pub async fn list_endpoints(
        &self,
        organization_id: Uuid,
        query: ListEndpointsQuery,
    ) -> Result<WebhookEndpointListResponse, WebhookError> {
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let endpoints = self.endpoints.list(organization_id, limit, offset).await?;
        let total = self.endpoints.count(organization_id).await?;

        Ok(WebhookEndpointListResponse {
            items: endpoints.into_iter().map(endpoint_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get a single endpoint.
    pub async fn get_endpoint(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        let endpoint = self
            .endpoints
            .find_by_id(organization_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Apply a partial update to an endpoint.
    ///
    /// The `failed` status can be neither set nor cleared here: auto-disable
    /// owns entering it, and reactivation is the only way out.
    pub async fn update_endpoint(
        &self,
        organization_id: Uuid,
        id: Uuid,
        request: UpdateWebhookEndpointRequest,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        if let Some(ref url) = request.url {
            validation::validate_webhook_url(url, self.allow_http)?;
        }
        if let Some(ref event_types) = request.event_types {
            validation::validate_event_types(event_types)?;
        }

        let current = self
            .endpoints
            .find_by_id(organization_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        if let Some(status) = request.status {
            if status == WebhookEndpointStatus::Failed {
                return Err(WebhookError::Validation(
                    "the failed status cannot be set directly".to_string(),
                ));
            }
            if current.status == WebhookEndpointStatus::Failed {
                return Err(WebhookError::Validation(
                    "a failed endpoint must be reactivated before its status can change"
                        .to_string(),
                ));
            }
        }

        let endpoint = self
            .endpoints
            .update(
                organization_id,
                id,
                UpdateWebhookEndpoint {
                    url: request.url,
                    description: request.description,
                    event_types: request.event_types,
                    custom_headers: request.custom_headers,
                    status: request.status,
                },
            )
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Delete an endpoint and its delivery history.
    pub async fn delete_endpoint(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<(), WebhookError> {
        let deleted = self.endpoints.delete(organization_id, id).await?;
        if !deleted {
            return Err(WebhookError::EndpointNotFound);
        }

        tracing::info!(
            target: "webhook_delivery",
            organization_id = %organization_id,
            endpoint_id = %id,
            "webhook endpoint deleted"
        );

        Ok(())
    }

    /// Reactivate an auto-disabled endpoint: back to active with a zeroed
    /// failure counter in one atomic step.
    pub async fn reactivate_endpoint(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        let endpoint = self
            .endpoints
            .reactivate(organization_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        tracing::info!(
            target: "webhook_delivery",
            organization_id = %organization_id,
            endpoint_id = %id,
            "webhook endpoint reactivated"
        );

        Ok(endpoint_to_response(endpoint))
    }

    /// Replace the endpoint's signing secret. The new plaintext secret is
    /// returned exactly once; deliveries signed with the old secret are not
    /// re-signed.
    pub async fn rotate_secret(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookEndpointCreatedResponse, WebhookError> {
        let secret = crypto::generate_endpoint_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let updated = self
            .endpoints
            .set_secret(organization_id, id, &secret_encrypted)
            .await?;
        if !updated {
            return Err(WebhookError::EndpointNotFound);
        }

        // Re-fetch so the response reflects the post-rotation row
        let endpoint = self
            .endpoints
            .find_by_id(organization_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        tracing::info!(
            target: "webhook_delivery",
            organization_id = %organization_id,
            endpoint_id = %id,
            "webhook endpoint secret rotated"
        );

        Ok(WebhookEndpointCreatedResponse {
            endpoint: endpoint_to_response(endpoint),
            secret,
        })
    }

    /// Enqueue a test delivery to an endpoint, bypassing the subscription
    /// filter. The endpoint must be active.
    pub async fn send_test_delivery(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<TestDeliveryResponse, WebhookError> {
        let endpoint = self
            .endpoints
            .find_by_id(organization_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        if !endpoint.is_active() {
            return Err(WebhookError::Validation(
                "endpoint is not active".to_string(),
            ));
        }

        let data = serde_json::json!({
            "test": true,
            "requested_at": Utc::now(),
        });

        let delivery_id = self
            .dispatcher
            .dispatch_to_endpoint(&endpoint, TEST_EVENT_TYPE, data)
            .await?;

        Ok(TestDeliveryResponse { delivery_id })
    }

    /// List delivery history for an endpoint, newest first.
    pub async fn list_deliveries(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        query: ListDeliveriesQuery,
    ) -> Result<WebhookDeliveryListResponse, WebhookError> {
        // Resolve the endpoint first so a foreign id is a 404, not an empty list
        self.endpoints
            .find_by_id(organization_id, endpoint_id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        let status = parse_status_filter(query.status.as_deref())?;
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let deliveries = self
            .ledger
            .list_by_endpoint(organization_id, endpoint_id, limit, offset, status)
            .await?;
        let total = self
            .ledger
            .count_by_endpoint(organization_id, endpoint_id, status)
            .await?;

        Ok(WebhookDeliveryListResponse {
            items: deliveries.into_iter().map(delivery_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get a single delivery record.
    pub async fn get_delivery(
        &self,
        organization_id: Uuid,
        endpoint_id: Uuid,
        delivery_id: Uuid,
    ) -> Result<WebhookDeliveryResponse, WebhookError> {
        let delivery = self
            .ledger
            .find_by_id(organization_id, endpoint_id, delivery_id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound)?;

        Ok(delivery_to_response(delivery))
    }
}

fn parse_status_filter(
    status: Option<&str>,
) -> Result<Option<WebhookDeliveryStatus>, WebhookError> {
    match status {
        None => Ok(None),
        Some("pending") => Ok(Some(WebhookDeliveryStatus::Pending)),
        Some("success") => Ok(Some(WebhookDeliveryStatus::Success)),
        Some("failed") => Ok(Some(WebhookDeliveryStatus::Failed)),
        Some(other) => Err(WebhookError::Validation(format!(
            "unknown delivery status: {other}"
        ))),
    }
}

fn endpoint_to_response(endpoint: WebhookEndpoint) -> WebhookEndpointResponse {
    WebhookEndpointResponse {
        id: endpoint.id,
        organization_id: endpoint.organization_id,
        url: endpoint.url,
        description: endpoint.description,
        event_types: endpoint.event_types,
        status: endpoint.status,
        custom_headers: endpoint.custom_headers.0,
        consecutive_failures: endpoint.consecutive_failures,
        last_triggered_at: endpoint.last_triggered_at,
        created_at: endpoint.created_at,
        updated_at: endpoint.updated_at,
    }
}

fn delivery_to_response(
    delivery: attendly_db::models::WebhookDelivery,
) -> WebhookDeliveryResponse {
    WebhookDeliveryResponse {
        id: delivery.id,
        endpoint_id: delivery.endpoint_id,
        event_type: delivery.event_type,
        status: delivery.status,
        attempts: delivery.attempts,
        response_status: delivery.response_status,
        response_body: delivery.response_body,
        error_message: delivery.error_message,
        last_attempt_at: delivery.last_attempt_at,
        created_at: delivery.created_at,
    }
}
