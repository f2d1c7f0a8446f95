//! Durable delivery job queue model.
//!
//! A job carries everything a worker needs to execute one delivery attempt.
//! Claiming sets `claimed_at` under `FOR UPDATE SKIP LOCKED` so concurrent
//! workers never double-execute a job; completion deletes the row. Stale
//! claims (a worker died mid-flight) are released back to the queue.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A queued delivery attempt.
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryJob {
    pub id: Uuid,
    /// Stable key of the logical delivery this attempt belongs to.
    pub delivery_id: Uuid,
    pub endpoint_id: Uuid,
    pub organization_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    /// 1-based attempt number.
    pub attempt: i32,
    pub run_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to enqueue a delivery attempt.
#[derive(Debug, Clone)]
pub struct NewDeliveryJob {
    pub delivery_id: Uuid,
    pub endpoint_id: Uuid,
    pub organization_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub attempt: i32,
    pub run_at: DateTime<Utc>,
}

impl DeliveryJob {
    /// Enqueue a job.
    pub async fn enqueue(pool: &PgPool, new: NewDeliveryJob) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO webhook_jobs
                (delivery_id, endpoint_id, organization_id, event_type, payload, attempt, run_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(new.delivery_id)
        .bind(new.endpoint_id)
        .bind(new.organization_id)
        .bind(&new.event_type)
        .bind(&new.payload)
        .bind(new.attempt)
        .bind(new.run_at)
        .fetch_one(pool)
        .await
    }

    /// Claim up to `limit` due jobs for execution.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE webhook_jobs
            SET claimed_at = now()
            WHERE id IN (
                SELECT id FROM webhook_jobs
                WHERE run_at <= now() AND claimed_at IS NULL
                ORDER BY run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            ",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Remove a completed job.
    pub async fn complete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM webhook_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Release jobs claimed before the cutoff back to the queue. Returns the
    /// number of jobs released.
    pub async fn release_stale(
        pool: &PgPool,
        claimed_before: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE webhook_jobs
            SET claimed_at = NULL
            WHERE claimed_at IS NOT NULL AND claimed_at < $1
            ",
        )
        .bind(claimed_before)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count unclaimed jobs (queue depth).
    pub async fn depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_jobs WHERE claimed_at IS NULL
            ",
        )
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }
}
