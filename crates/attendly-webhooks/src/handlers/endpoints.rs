//! CRUD handlers for webhook endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::handlers::OrgContext;
use crate::models::{
    CreateWebhookEndpointRequest, EventTypeInfo, EventTypeListResponse, ListEndpointsQuery,
    TestDeliveryResponse, UpdateWebhookEndpointRequest, WebhookEndpointCreatedResponse,
    WebhookEndpointListResponse, WebhookEndpointResponse, WebhookEventType,
};
use crate::router::WebhooksState;

/// Register a new webhook endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    request_body = CreateWebhookEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created; the secret is returned only here", body = WebhookEndpointCreatedResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Endpoint limit exceeded"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Json(request): Json<CreateWebhookEndpointRequest>,
) -> ApiResult<(StatusCode, Json<WebhookEndpointCreatedResponse>)> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .create_endpoint(org.organization_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List webhook endpoints.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    params(ListEndpointsQuery),
    responses(
        (status = 200, description = "Paginated endpoint list", body = WebhookEndpointListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_endpoints_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Query(query): Query<ListEndpointsQuery>,
) -> ApiResult<Json<WebhookEndpointListResponse>> {
    let response = state
        .endpoint_service
        .list_endpoints(org.organization_id, query)
        .await?;

    Ok(Json(response))
}

/// Get a single webhook endpoint.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Endpoint details", body = WebhookEndpointResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    let response = state
        .endpoint_service
        .get_endpoint(org.organization_id, id)
        .await?;

    Ok(Json(response))
}

/// Update a webhook endpoint.
#[utoipa::path(
    patch,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    request_body = UpdateWebhookEndpointRequest,
    responses(
        (status = 200, description = "Endpoint updated", body = WebhookEndpointResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWebhookEndpointRequest>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .update_endpoint(org.organization_id, id, request)
        .await?;

    Ok(Json(response))
}

/// Delete a webhook endpoint.
#[utoipa::path(
    delete,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .endpoint_service
        .delete_endpoint(org.organization_id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Reactivate an auto-disabled endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/reactivate",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Endpoint reactivated", body = WebhookEndpointResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn reactivate_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    let response = state
        .endpoint_service
        .reactivate_endpoint(org.organization_id, id)
        .await?;

    Ok(Json(response))
}

/// Rotate an endpoint's signing secret.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/rotate-secret",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Secret rotated; the new secret is returned only here", body = WebhookEndpointCreatedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rotate_secret_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEndpointCreatedResponse>> {
    let response = state
        .endpoint_service
        .rotate_secret(org.organization_id, id)
        .await?;

    Ok(Json(response))
}

/// Enqueue a test delivery to an endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/test",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 202, description = "Test delivery enqueued", body = TestDeliveryResponse),
        (status = 400, description = "Endpoint is not active"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn test_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<TestDeliveryResponse>)> {
    let response = state
        .endpoint_service
        .send_test_delivery(org.organization_id, id)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// List the event types endpoints can subscribe to.
#[utoipa::path(
    get,
    path = "/webhooks/event-types",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Supported event types", body = EventTypeListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_event_types_handler() -> Json<EventTypeListResponse> {
    let event_types = WebhookEventType::all()
        .into_iter()
        .map(|et| EventTypeInfo {
            event_type: et.as_str().to_string(),
            category: et.category().to_string(),
            description: et.description().to_string(),
        })
        .collect();

    Json(EventTypeListResponse { event_types })
}
