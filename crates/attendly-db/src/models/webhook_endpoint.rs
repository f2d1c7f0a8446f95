//! Webhook endpoint registry model.
//!
//! An endpoint is a customer-registered HTTP destination subscribed to one or
//! more event types. The `failed` status is only reachable through the
//! consecutive-failure auto-disable path; explicit reactivation is the only
//! way back to `active`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

/// Status of a webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "webhook_endpoint_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookEndpointStatus {
    /// Receiving deliveries.
    #[default]
    Active,
    /// Paused by the customer; deliveries are skipped.
    Inactive,
    /// Auto-disabled after too many consecutive failures.
    Failed,
}

impl WebhookEndpointStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
        }
    }
}

/// A customer-registered webhook endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    /// AES-256-GCM encrypted signing secret (plaintext is shown once at creation).
    pub secret_encrypted: String,
    /// Event types this endpoint is subscribed to.
    pub event_types: Vec<String>,
    pub status: WebhookEndpointStatus,
    /// Extra headers attached to every delivery to this endpoint.
    pub custom_headers: Json<HashMap<String, String>>,
    /// Consecutive failed delivery attempts since the last success.
    pub consecutive_failures: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    /// Whether the endpoint should receive deliveries.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WebhookEndpointStatus::Active
    }

    /// Whether the endpoint is subscribed to the given event type.
    #[must_use]
    pub fn is_subscribed_to(&self, event_type: &str) -> bool {
        self.event_types.iter().any(|et| et == event_type)
    }
}

/// Data needed to register a new endpoint.
#[derive(Debug, Clone)]
pub struct NewWebhookEndpoint {
    pub organization_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub secret_encrypted: String,
    pub event_types: Vec<String>,
    pub custom_headers: HashMap<String, String>,
}

/// Partial update for an endpoint. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateWebhookEndpoint {
    pub url: Option<String>,
    pub description: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub custom_headers: Option<HashMap<String, String>>,
    pub status: Option<WebhookEndpointStatus>,
}

impl WebhookEndpoint {
    /// Register a new endpoint.
    pub async fn create(pool: &PgPool, new: NewWebhookEndpoint) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO webhook_endpoints
                (organization_id, url, description, secret_encrypted, event_types, custom_headers)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(new.organization_id)
        .bind(&new.url)
        .bind(&new.description)
        .bind(&new.secret_encrypted)
        .bind(&new.event_types)
        .bind(Json(&new.custom_headers))
        .fetch_one(pool)
        .await
    }

    /// Find an endpoint by id, scoped to its organization.
    pub async fn find_by_id(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM webhook_endpoints
            WHERE organization_id = $1 AND id = $2
            ",
        )
        .bind(organization_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Resolve active endpoints subscribed to an event type.
    pub async fn find_active_subscribed(
        pool: &PgPool,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM webhook_endpoints
            WHERE organization_id = $1
              AND status = 'active'
              AND $2 = ANY(event_types)
            ORDER BY created_at
            ",
        )
        .bind(organization_id)
        .bind(event_type)
        .fetch_all(pool)
        .await
    }

    /// List an organization's endpoints with pagination.
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM webhook_endpoints
            WHERE organization_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Count an organization's endpoints.
    pub async fn count_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_endpoints
            WHERE organization_id = $1
            ",
        )
        .bind(organization_id)
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }

    /// Apply a partial update. Returns the updated row, or `None` if not found.
    pub async fn update(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        update: UpdateWebhookEndpoint,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE webhook_endpoints SET
                url = COALESCE($3, url),
                description = COALESCE($4, description),
                event_types = COALESCE($5, event_types),
                custom_headers = COALESCE($6, custom_headers),
                status = COALESCE($7, status),
                updated_at = now()
            WHERE organization_id = $1 AND id = $2
            RETURNING *
            ",
        )
        .bind(organization_id)
        .bind(id)
        .bind(&update.url)
        .bind(&update.description)
        .bind(&update.event_types)
        .bind(update.custom_headers.as_ref().map(Json))
        .bind(update.status)
        .fetch_optional(pool)
        .await
    }

    /// Delete an endpoint. Returns true if a row was removed.
    pub async fn delete(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM webhook_endpoints
            WHERE organization_id = $1 AND id = $2
            ",
        )
        .bind(organization_id)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the endpoint's encrypted secret.
    pub async fn set_secret(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE webhook_endpoints
            SET secret_encrypted = $3, updated_at = now()
            WHERE organization_id = $1 AND id = $2
            ",
        )
        .bind(organization_id)
        .bind(id)
        .bind(secret_encrypted)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful delivery: zero the failure counter and stamp
    /// the last-triggered time in one statement.
    pub async fn mark_triggered(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE webhook_endpoints
            SET consecutive_failures = 0, last_triggered_at = now(), updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Atomically increment the consecutive-failure counter, returning the
    /// new value.
    pub async fn increment_failures(pool: &PgPool, id: Uuid) -> Result<i32, sqlx::Error> {
        let row: (i32,) = sqlx::query_as(
            r"
            UPDATE webhook_endpoints
            SET consecutive_failures = consecutive_failures + 1, updated_at = now()
            WHERE id = $1
            RETURNING consecutive_failures
            ",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }

    /// Auto-disable an endpoint after crossing the failure threshold.
    pub async fn disable_failed(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE webhook_endpoints
            SET status = 'failed', updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Manual reactivation: back to `active` with a zeroed failure counter,
    /// atomically. The only way out of the auto-disabled state.
    pub async fn reactivate(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE webhook_endpoints
            SET status = 'active', consecutive_failures = 0, updated_at = now()
            WHERE organization_id = $1 AND id = $2
            RETURNING *
            ",
        )
        .bind(organization_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(status: WebhookEndpointStatus, event_types: &[&str]) -> WebhookEndpoint {
        WebhookEndpoint {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            url: "https://hooks.example.com/attendly".to_string(),
            description: None,
            secret_encrypted: String::new(),
            event_types: event_types.iter().map(ToString::to_string).collect(),
            status,
            custom_headers: Json(HashMap::new()),
            consecutive_failures: 0,
            last_triggered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_active() {
        assert!(endpoint(WebhookEndpointStatus::Active, &[]).is_active());
        assert!(!endpoint(WebhookEndpointStatus::Inactive, &[]).is_active());
        assert!(!endpoint(WebhookEndpointStatus::Failed, &[]).is_active());
    }

    #[test]
    fn test_is_subscribed_to() {
        let ep = endpoint(
            WebhookEndpointStatus::Active,
            &["meeting.ended", "transcript.ready"],
        );
        assert!(ep.is_subscribed_to("meeting.ended"));
        assert!(!ep.is_subscribed_to("meeting.started"));
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(WebhookEndpointStatus::Active.as_str(), "active");
        assert_eq!(WebhookEndpointStatus::Inactive.as_str(), "inactive");
        assert_eq!(WebhookEndpointStatus::Failed.as_str(), "failed");
    }
}
