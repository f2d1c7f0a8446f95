//! In-memory job queue for tests and local development.
//!
//! Mirrors the Postgres queue semantics: claiming marks a job and hides it
//! from other claimers, completion removes it, and stale claims can be
//! released back.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use attendly_db::models::{DeliveryJob, NewDeliveryJob};

use crate::error::WebhookError;
use crate::queue::JobQueue;

#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<HashMap<Uuid, DeliveryJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// All jobs, claimed or not, for test assertions.
    pub async fn all(&self) -> Vec<DeliveryJob> {
        let mut jobs: Vec<DeliveryJob> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.run_at);
        jobs
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, new: NewDeliveryJob) -> Result<DeliveryJob, WebhookError> {
        let job = DeliveryJob {
            id: Uuid::new_v4(),
            delivery_id: new.delivery_id,
            endpoint_id: new.endpoint_id,
            organization_id: new.organization_id,
            event_type: new.event_type,
            payload: new.payload,
            attempt: new.attempt,
            run_at: new.run_at,
            claimed_at: None,
            created_at: Utc::now(),
        };
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<DeliveryJob>, WebhookError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;
        let mut due: Vec<Uuid> = jobs
            .values()
            .filter(|j| j.claimed_at.is_none() && j.run_at <= now)
            .map(|j| j.id)
            .collect();
        due.sort_by_key(|id| jobs[id].run_at);
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(job) = jobs.get_mut(&id) {
                job.claimed_at = Some(now);
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete(&self, id: Uuid) -> Result<(), WebhookError> {
        self.jobs.lock().await.remove(&id);
        Ok(())
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, WebhookError> {
        let mut jobs = self.jobs.lock().await;
        let mut released = 0u64;
        for job in jobs.values_mut() {
            if job.claimed_at.is_some_and(|at| at < claimed_before) {
                job.claimed_at = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn depth(&self) -> Result<i64, WebhookError> {
        Ok(self
            .jobs
            .lock()
            .await
            .values()
            .filter(|j| j.claimed_at.is_none())
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(run_at: DateTime<Utc>) -> NewDeliveryJob {
        NewDeliveryJob {
            delivery_id: Uuid::new_v4(),
            endpoint_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            event_type: "meeting.ended".to_string(),
            payload: serde_json::json!({}),
            attempt: 1,
            run_at,
        }
    }

    #[tokio::test]
    async fn test_claim_skips_future_jobs() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job(Utc::now())).await.unwrap();
        queue
            .enqueue(job(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        let claimed = queue.claim_due(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(queue.depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claimed_jobs_are_exclusive() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job(Utc::now())).await.unwrap();

        assert_eq!(queue.claim_due(10).await.unwrap().len(), 1);
        assert!(queue.claim_due(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_removes_job() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job(Utc::now())).await.unwrap();
        let claimed = queue.claim_due(10).await.unwrap();

        queue.complete(claimed[0].id).await.unwrap();
        assert!(queue.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_release_stale_requeues() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job(Utc::now())).await.unwrap();
        queue.claim_due(10).await.unwrap();

        let released = queue
            .release_stale(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(released, 1);
        assert_eq!(queue.claim_due(10).await.unwrap().len(), 1);
    }
}
