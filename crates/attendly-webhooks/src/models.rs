//! API models and the outbound payload envelope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use attendly_db::models::{WebhookDeliveryStatus, WebhookEndpointStatus};

// ---------------------------------------------------------------------------
// Event type catalogue
// ---------------------------------------------------------------------------

/// Domain event types customers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum WebhookEventType {
    MeetingStarted,
    MeetingEnded,
    TranscriptReady,
    TranscriptFailed,
    SummaryReady,
    RecordingReady,
    SubscriptionUpdated,
    SubscriptionCanceled,
}

impl WebhookEventType {
    /// All known event types.
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::MeetingStarted,
            Self::MeetingEnded,
            Self::TranscriptReady,
            Self::TranscriptFailed,
            Self::SummaryReady,
            Self::RecordingReady,
            Self::SubscriptionUpdated,
            Self::SubscriptionCanceled,
        ]
    }

    /// The wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeetingStarted => "meeting.started",
            Self::MeetingEnded => "meeting.ended",
            Self::TranscriptReady => "transcript.ready",
            Self::TranscriptFailed => "transcript.failed",
            Self::SummaryReady => "summary.ready",
            Self::RecordingReady => "recording.ready",
            Self::SubscriptionUpdated => "subscription.updated",
            Self::SubscriptionCanceled => "subscription.canceled",
        }
    }

    /// Parse a wire name into an event type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|et| et.as_str() == s)
    }

    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MeetingStarted | Self::MeetingEnded => "meeting",
            Self::TranscriptReady | Self::TranscriptFailed => "transcript",
            Self::SummaryReady => "summary",
            Self::RecordingReady => "recording",
            Self::SubscriptionUpdated | Self::SubscriptionCanceled => "billing",
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::MeetingStarted => "The notetaker bot joined and the meeting began recording",
            Self::MeetingEnded => "A meeting ended and its artifacts are being processed",
            Self::TranscriptReady => "A meeting transcript finished processing",
            Self::TranscriptFailed => "Transcript processing failed permanently",
            Self::SummaryReady => "An AI summary is available for a meeting",
            Self::RecordingReady => "A meeting recording is available for download",
            Self::SubscriptionUpdated => "The organization's billing plan changed",
            Self::SubscriptionCanceled => "The organization's billing plan was canceled",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound payload envelope
// ---------------------------------------------------------------------------

/// The JSON body POSTed to customer endpoints.
///
/// `id` is the delivery id: stable across retries of the same logical
/// delivery, so consumers can deduplicate re-deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub id: Uuid,
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// API requests
// ---------------------------------------------------------------------------

/// Request body for registering an endpoint.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWebhookEndpointRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

/// Request body for a partial endpoint update.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWebhookEndpointRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub event_types: Option<Vec<String>>,
    pub custom_headers: Option<HashMap<String, String>>,
    /// `active` or `inactive`. The `failed` state cannot be set or cleared
    /// here; use the reactivate operation.
    #[schema(value_type = Option<String>)]
    pub status: Option<WebhookEndpointStatus>,
}

/// Pagination query for endpoint listings.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListEndpointsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Pagination/filter query for delivery history.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListDeliveriesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Filter by delivery status: `pending`, `success`, or `failed`.
    pub status: Option<String>,
}

fn default_limit() -> i64 {
    20
}

// ---------------------------------------------------------------------------
// API responses
// ---------------------------------------------------------------------------

/// An endpoint as returned by the API. The signing secret is never included;
/// see [`WebhookEndpointCreatedResponse`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub event_types: Vec<String>,
    #[schema(value_type = String)]
    pub status: WebhookEndpointStatus,
    pub custom_headers: HashMap<String, String>,
    pub consecutive_failures: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation/rotation response carrying the plaintext secret exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEndpointCreatedResponse {
    #[serde(flatten)]
    pub endpoint: WebhookEndpointResponse,
    /// Shown only in this response; stored encrypted.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEndpointListResponse {
    pub items: Vec<WebhookEndpointResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// A ledger row as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    #[schema(value_type = String)]
    pub status: WebhookDeliveryStatus,
    pub attempts: i32,
    pub response_status: Option<i16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryListResponse {
    pub items: Vec<WebhookDeliveryResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeInfo {
    pub event_type: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}

/// Response for a test-delivery request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TestDeliveryResponse {
    pub delivery_id: Uuid,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for et in WebhookEventType::all() {
            assert_eq!(WebhookEventType::parse(et.as_str()), Some(et));
        }
    }

    #[test]
    fn test_parse_unknown_event_type() {
        assert_eq!(WebhookEventType::parse("user.created"), None);
        assert_eq!(WebhookEventType::parse(""), None);
    }

    #[test]
    fn test_event_names_are_dotted() {
        for et in WebhookEventType::all() {
            assert!(et.as_str().contains('.'), "{} not dotted", et.as_str());
        }
    }

    #[test]
    fn test_payload_envelope_shape() {
        let payload = WebhookPayload {
            id: Uuid::new_v4(),
            event: "meeting.ended".to_string(),
            timestamp: Utc::now(),
            data: serde_json::json!({"meeting_id": "mtg_123"}),
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&payload).unwrap()).unwrap();
        assert!(json.get("id").is_some());
        assert_eq!(json["event"], "meeting.ended");
        assert!(json.get("timestamp").is_some());
        assert_eq!(json["data"]["meeting_id"], "mtg_123");
    }
}
