//! Device event scheduler
//!
//! Turns a reservation window into two queued light jobs (ON at start, OFF
//! at end). Job ids are derived from the window, so scheduling is idempotent.
//! Cancelling only needs the reservation and sub-court and drops every
//! window queued for that pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::device::{delay_until, EnqueueOutcome, JobKey, LightEventKind, LightJob};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::support::time::SharedClock;

/// One reservation window on one sub-court
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightWindow {
    pub reservation_id: i32,
    pub court_id: i32,
    pub sub_court_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub device_key: Option<String>,
}

pub struct LightScheduler {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
}

impl LightScheduler {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self { repos, clock }
    }

    /// Queue the ON and OFF events of `window`. Returns what happened to each
    /// (activation first).
    pub async fn schedule_window(&self, window: &LightWindow) -> DomainResult<[EnqueueOutcome; 2]> {
        if window.end_at <= window.start_at {
            return Err(DomainError::InvalidInput(format!(
                "light window end {} must be after start {}",
                window.end_at, window.start_at
            )));
        }

        let now = self.clock.now();
        let mut outcomes = [EnqueueOutcome::Inserted; 2];
        for (slot, (kind, fire_at)) in [
            (LightEventKind::Activate, window.start_at),
            (LightEventKind::Deactivate, window.end_at),
        ]
        .into_iter()
        .enumerate()
        {
            let delay = delay_until(fire_at, now);
            let key = JobKey::new(window.reservation_id, window.sub_court_id, window.start_at, kind);
            let job = LightJob::new(
                key,
                window.court_id,
                window.device_key.clone(),
                now + delay,
                now,
            );
            let job_id = job.id.clone();
            let outcome = self.repos.light_jobs().enqueue(job).await?;
            debug!(
                %job_id,
                %kind,
                delay_ms = delay.num_milliseconds(),
                ?outcome,
                "Light event scheduled"
            );
            metrics::counter!("light_jobs_scheduled_total", "kind" => kind.as_str()).increment(1);
            outcomes[slot] = outcome;
        }

        info!(
            reservation_id = window.reservation_id,
            sub_court_id = window.sub_court_id,
            start = %window.start_at,
            end = %window.end_at,
            "💡 Light window scheduled"
        );
        Ok(outcomes)
    }

    /// Drop the events of the reservation's windows on `sub_court_id` that
    /// have not fired. Returns how many jobs were removed; missing or
    /// in-flight jobs are not an error.
    pub async fn cancel_window(&self, reservation_id: i32, sub_court_id: i32) -> DomainResult<u64> {
        let removed = self
            .repos
            .light_jobs()
            .remove_for_sub_court(reservation_id, sub_court_id)
            .await?;
        if removed > 0 {
            info!(reservation_id, sub_court_id, removed, "💡 Light window cancelled");
            metrics::counter!("light_jobs_cancelled_total").increment(removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::{JobState, LightJobQueue};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::support::time::{Clock, ManualClock};
    use chrono::{Duration, TimeZone};

    fn setup() -> (Arc<InMemoryStorage>, Arc<ManualClock>, LightScheduler) {
        let store = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 5, 7, 0, 0).unwrap()));
        let scheduler = LightScheduler::new(store.clone(), clock.clone());
        (store, clock, scheduler)
    }

    fn window(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> LightWindow {
        LightWindow {
            reservation_id: 42,
            court_id: 3,
            sub_court_id: 7,
            start_at,
            end_at,
            device_key: Some("524f79a3f30e8462".into()),
        }
    }

    #[tokio::test]
    async fn scheduling_twice_keeps_one_job_per_kind() {
        let (store, clock, scheduler) = setup();
        let start = clock.now() + Duration::hours(1);
        let w = window(start, start + Duration::hours(1));

        let first = scheduler.schedule_window(&w).await.unwrap();
        assert_eq!(first, [EnqueueOutcome::Inserted, EnqueueOutcome::Inserted]);
        let second = scheduler.schedule_window(&w).await.unwrap();
        assert_eq!(second, [EnqueueOutcome::Replaced, EnqueueOutcome::Replaced]);
        assert_eq!(store.light_job_count(), 2);

        let on = store
            .find(&JobKey::new(42, 7, start, LightEventKind::Activate).job_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on.run_at, start);
        assert_eq!(on.state, JobState::Queued);
    }

    #[tokio::test]
    async fn past_events_fire_immediately() {
        let (store, clock, scheduler) = setup();
        let now = clock.now();
        let start = now - Duration::hours(2);
        scheduler
            .schedule_window(&window(start, now + Duration::minutes(30)))
            .await
            .unwrap();

        let on = store
            .find(&JobKey::new(42, 7, start, LightEventKind::Activate).job_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on.run_at, now);
    }

    #[tokio::test]
    async fn rejects_empty_window() {
        let (_, clock, scheduler) = setup();
        let at = clock.now();
        assert!(matches!(
            scheduler.schedule_window(&window(at, at)).await,
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn cancel_is_a_no_op_after_firing() {
        let (store, clock, scheduler) = setup();
        let start = clock.now() + Duration::hours(1);
        scheduler
            .schedule_window(&window(start, start + Duration::hours(1)))
            .await
            .unwrap();
        let next_day = start + Duration::days(1);
        scheduler
            .schedule_window(&window(next_day, next_day + Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(store.light_job_count(), 4);

        assert_eq!(scheduler.cancel_window(42, 7).await.unwrap(), 4);
        assert_eq!(store.light_job_count(), 0);
        assert_eq!(scheduler.cancel_window(42, 7).await.unwrap(), 0);
        assert_eq!(scheduler.cancel_window(999, 1).await.unwrap(), 0);
    }
}
