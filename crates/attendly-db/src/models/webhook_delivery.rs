//! Delivery ledger model.
//!
//! One row per logical delivery (endpoint × event occurrence), keyed by a
//! delivery id generated at dispatch time. Retry attempts update the same row;
//! the attempt counter never decreases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

/// Status of a logical delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "webhook_delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookDeliveryStatus {
    /// Awaiting the next attempt.
    #[default]
    Pending,
    /// A 2xx response was received.
    Success,
    /// All retry attempts are exhausted.
    Failed,
}

impl WebhookDeliveryStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// A ledger row for one logical delivery.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: WebhookDeliveryStatus,
    pub attempts: i32,
    pub response_status: Option<i16>,
    /// Response body, truncated before persistence.
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one delivery attempt, upserted into the ledger.
#[derive(Debug, Clone)]
pub struct RecordDeliveryAttempt {
    pub delivery_id: Uuid,
    pub organization_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: WebhookDeliveryStatus,
    pub attempt: i32,
    pub response_status: Option<i16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

impl WebhookDelivery {
    /// Upsert an attempt outcome keyed by delivery id. Repeated calls for the
    /// same delivery update one row; `GREATEST` keeps the attempt counter
    /// monotone even if attempts land out of order.
    pub async fn record(pool: &PgPool, rec: RecordDeliveryAttempt) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO webhook_deliveries
                (id, organization_id, endpoint_id, event_type, payload, status,
                 attempts, response_status, response_body, error_message, last_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                attempts = GREATEST(webhook_deliveries.attempts, EXCLUDED.attempts),
                response_status = EXCLUDED.response_status,
                response_body = EXCLUDED.response_body,
                error_message = EXCLUDED.error_message,
                last_attempt_at = now()
            RETURNING *
            ",
        )
        .bind(rec.delivery_id)
        .bind(rec.organization_id)
        .bind(rec.endpoint_id)
        .bind(&rec.event_type)
        .bind(&rec.payload)
        .bind(rec.status)
        .bind(rec.attempt)
        .bind(rec.response_status)
        .bind(&rec.response_body)
        .bind(&rec.error_message)
        .fetch_one(pool)
        .await
    }

    /// Find one delivery, scoped to its endpoint and organization.
    pub async fn find_by_id(
        pool: &PgPool,
        organization_id: Uuid,
        endpoint_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM webhook_deliveries
            WHERE organization_id = $1 AND endpoint_id = $2 AND id = $3
            ",
        )
        .bind(organization_id)
        .bind(endpoint_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List deliveries for an endpoint, newest first, optionally filtered by
    /// status.
    pub async fn list_by_endpoint(
        pool: &PgPool,
        organization_id: Uuid,
        endpoint_id: Uuid,
        limit: i64,
        offset: i64,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM webhook_deliveries
            WHERE organization_id = $1 AND endpoint_id = $2
              AND ($5::webhook_delivery_status IS NULL OR status = $5)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(organization_id)
        .bind(endpoint_id)
        .bind(limit)
        .bind(offset)
        .bind(status)
        .fetch_all(pool)
        .await
    }

    /// Count deliveries for an endpoint, optionally filtered by status.
    pub async fn count_by_endpoint(
        pool: &PgPool,
        organization_id: Uuid,
        endpoint_id: Uuid,
        status: Option<WebhookDeliveryStatus>,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE organization_id = $1 AND endpoint_id = $2
              AND ($3::webhook_delivery_status IS NULL OR status = $3)
            ",
        )
        .bind(organization_id)
        .bind(endpoint_id)
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(WebhookDeliveryStatus::Pending.as_str(), "pending");
        assert_eq!(WebhookDeliveryStatus::Success.as_str(), "success");
        assert_eq!(WebhookDeliveryStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&WebhookDeliveryStatus::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }
}
