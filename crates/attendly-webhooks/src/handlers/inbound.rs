//! Inbound provider webhook handler.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::inbound::InboundOutcome;
use crate::router::WebhooksState;

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize, ToSchema)]
pub struct InboundAckResponse {
    pub received: bool,
    /// True when this request was a redelivery of an already-handled event.
    pub duplicate: bool,
}

/// Receive a webhook from an upstream provider.
///
/// The raw body bytes are required for signature verification, so this
/// handler takes `Bytes` rather than a typed JSON extractor. Duplicates are
/// acknowledged with 200 so the provider stops redelivering.
#[utoipa::path(
    post,
    path = "/webhooks/inbound/{provider}",
    tag = "Webhooks",
    params(("provider" = String, Path, description = "Provider key: stripe, recall, workos, or zoom")),
    request_body(content = String, description = "Raw provider payload; the shape varies by provider"),
    responses(
        (status = 200, description = "Event accepted (or already handled)", body = InboundAckResponse),
        (status = 400, description = "Verified but malformed event"),
        (status = 401, description = "Verification failed"),
        (status = 404, description = "Unknown provider"),
    )
)]
pub async fn inbound_webhook_handler(
    State(state): State<WebhooksState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<InboundAckResponse>> {
    let outcome = state
        .inbound_processor
        .process(&provider, &headers, &body)
        .await?;

    Ok(Json(InboundAckResponse {
        received: true,
        duplicate: outcome == InboundOutcome::Duplicate,
    }))
}
