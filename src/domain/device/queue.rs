//! Delayed-dispatch queue interface for light jobs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::LightJob;
use crate::domain::DomainResult;

/// Result of submitting a job whose id may already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No job with this id existed
    Inserted,
    /// A queued or exhausted job was overwritten with the new fire time
    Replaced,
    /// The job is being dispatched right now; left untouched
    InFlight,
}

/// Durable store of scheduled light jobs.
///
/// Claiming is the only way a job reaches `Dispatching`, and implementations
/// must make it exclusive: two dispatchers never claim the same job.
#[async_trait]
pub trait LightJobQueue: Send + Sync {
    /// Insert, or replace a job with the same id that is not in flight.
    async fn enqueue(&self, job: LightJob) -> DomainResult<EnqueueOutcome>;

    /// Drop every job of a reservation on one sub-court that is not in
    /// flight. Returns how many were removed.
    async fn remove_for_sub_court(&self, reservation_id: i32, sub_court_id: i32) -> DomainResult<u64>;

    async fn find(&self, job_id: &str) -> DomainResult<Option<LightJob>>;

    /// Claim up to `limit` jobs due at `now`, oldest first. Jobs stuck in
    /// `Dispatching` since before `stale_before` are claimed again.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<LightJob>>;

    /// Delivered: delete the job.
    async fn complete(&self, job_id: &str) -> DomainResult<()>;

    /// Failed with attempts left: back to `Queued` at `retry_at`.
    async fn retry_later(
        &self,
        job_id: &str,
        attempts: u32,
        retry_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Failed for the last time.
    async fn mark_exhausted(
        &self,
        job_id: &str,
        attempts: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()>;
}
