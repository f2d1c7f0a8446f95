//! Delivery history handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::handlers::OrgContext;
use crate::models::{ListDeliveriesQuery, WebhookDeliveryListResponse, WebhookDeliveryResponse};
use crate::router::WebhooksState;

/// List deliveries for an endpoint.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/deliveries",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID"),
        ListDeliveriesQuery
    ),
    responses(
        (status = 200, description = "Paginated delivery history", body = WebhookDeliveryListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_deliveries_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<WebhookDeliveryListResponse>> {
    let response = state
        .endpoint_service
        .list_deliveries(org.organization_id, id, query)
        .await?;

    Ok(Json(response))
}

/// Get a single delivery record.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/deliveries/{delivery_id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID"),
        ("delivery_id" = Uuid, Path, description = "Delivery ID")
    ),
    responses(
        (status = 200, description = "Delivery details", body = WebhookDeliveryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Delivery not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(org): Extension<OrgContext>,
    Path((id, delivery_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<WebhookDeliveryResponse>> {
    let response = state
        .endpoint_service
        .get_delivery(org.organization_id, id, delivery_id)
        .await?;

    Ok(Json(response))
}
