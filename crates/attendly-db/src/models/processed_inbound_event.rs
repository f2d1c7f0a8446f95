//! Inbound event idempotency model.
//!
//! A record is created once per `(provider, provider_event_id)` pair and never
//! updated. The table's unique constraint is the sole concurrency primitive:
//! `ON CONFLICT DO NOTHING` makes the claim a race-safe first-writer-wins
//! insert with no application-level locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Record of a processed inbound provider event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProcessedInboundEvent {
    pub id: Uuid,
    /// Provider key, e.g. `stripe`.
    pub provider: String,
    /// The provider's own event identifier (globally unique per provider).
    pub provider_event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedInboundEvent {
    /// Attempt to claim an inbound event. Returns true when this caller is the
    /// first to see it; false on a uniqueness conflict (already handled).
    /// A duplicate is normal control flow, not an error.
    pub async fn claim(
        pool: &PgPool,
        provider: &str,
        provider_event_id: &str,
        event_type: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            INSERT INTO processed_inbound_events (provider, provider_event_id, event_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_event_id) DO NOTHING
            ",
        )
        .bind(provider)
        .bind(provider_event_id)
        .bind(event_type)
        .execute(pool)
        .await?;

        // rows_affected = 1 means we inserted, 0 means conflict (duplicate)
        Ok(result.rows_affected() > 0)
    }

    /// Read-only check with no claim side effect.
    pub async fn is_processed(
        pool: &PgPool,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS(
                SELECT 1 FROM processed_inbound_events
                WHERE provider = $1 AND provider_event_id = $2
            )
            ",
        )
        .bind(provider)
        .bind(provider_event_id)
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }

    /// Delete records processed before the cutoff. Only touches old rows, so
    /// it is safe to run concurrently with claims.
    pub async fn sweep_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM processed_inbound_events WHERE processed_at < $1
            ",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
