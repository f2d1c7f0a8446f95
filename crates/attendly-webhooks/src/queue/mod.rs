//! Durable delivery job queue seam.
//!
//! The queue owns retry timing: a job's `run_at` is set by the dispatcher
//! (immediately for first attempts, backed off for retries) and workers only
//! ever see jobs that are due. Claiming is exclusive; a claimed job is
//! invisible to other workers until completed or released.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use attendly_db::models::{DeliveryJob, NewDeliveryJob};

use crate::error::WebhookError;

mod memory;
mod postgres;

pub use memory::InMemoryJobQueue;
pub use postgres::PgJobQueue;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a delivery attempt.
    async fn enqueue(&self, new: NewDeliveryJob) -> Result<DeliveryJob, WebhookError>;

    /// Claim up to `limit` due jobs for exclusive execution.
    async fn claim_due(&self, limit: i64) -> Result<Vec<DeliveryJob>, WebhookError>;

    /// Remove a completed job.
    async fn complete(&self, id: Uuid) -> Result<(), WebhookError>;

    /// Release jobs claimed before the cutoff back to the queue. Returns the
    /// number released.
    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, WebhookError>;

    /// Count unclaimed jobs.
    async fn depth(&self) -> Result<i64, WebhookError>;
}
