//! Axum router setup for the webhook API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::inbound::InboundProcessor;
use crate::handlers::{deliveries, endpoints, inbound};
use crate::services::EndpointService;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub endpoint_service: Arc<EndpointService>,
    pub inbound_processor: Arc<InboundProcessor>,
}

impl WebhooksState {
    pub fn new(
        endpoint_service: Arc<EndpointService>,
        inbound_processor: Arc<InboundProcessor>,
    ) -> Self {
        Self {
            endpoint_service,
            inbound_processor,
        }
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Endpoint CRUD
        .route(
            "/webhooks/endpoints",
            post(endpoints::create_endpoint_handler).get(endpoints::list_endpoints_handler),
        )
        .route(
            "/webhooks/endpoints/:id",
            get(endpoints::get_endpoint_handler)
                .patch(endpoints::update_endpoint_handler)
                .delete(endpoints::delete_endpoint_handler),
        )
        .route(
            "/webhooks/endpoints/:id/reactivate",
            post(endpoints::reactivate_endpoint_handler),
        )
        .route(
            "/webhooks/endpoints/:id/rotate-secret",
            post(endpoints::rotate_secret_handler),
        )
        .route(
            "/webhooks/endpoints/:id/test",
            post(endpoints::test_endpoint_handler),
        )
        // Event types
        .route(
            "/webhooks/event-types",
            get(endpoints::list_event_types_handler),
        )
        // Delivery history
        .route(
            "/webhooks/endpoints/:id/deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route(
            "/webhooks/endpoints/:id/deliveries/:delivery_id",
            get(deliveries::get_delivery_handler),
        )
        // Inbound provider webhooks (verified by signature, not by session)
        .route(
            "/webhooks/inbound/:provider",
            post(inbound::inbound_webhook_handler),
        )
        .with_state(state)
}
