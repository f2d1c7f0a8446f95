//! Postgres-backed job queue, delegating to the `attendly-db` model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use attendly_db::models::{DeliveryJob, NewDeliveryJob};

use crate::error::WebhookError;
use crate::queue::JobQueue;

#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, new: NewDeliveryJob) -> Result<DeliveryJob, WebhookError> {
        Ok(DeliveryJob::enqueue(&self.pool, new).await?)
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<DeliveryJob>, WebhookError> {
        Ok(DeliveryJob::claim_due(&self.pool, limit).await?)
    }

    async fn complete(&self, id: Uuid) -> Result<(), WebhookError> {
        Ok(DeliveryJob::complete(&self.pool, id).await?)
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, WebhookError> {
        Ok(DeliveryJob::release_stale(&self.pool, claimed_before).await?)
    }

    async fn depth(&self) -> Result<i64, WebhookError> {
        Ok(DeliveryJob::depth(&self.pool).await?)
    }
}
