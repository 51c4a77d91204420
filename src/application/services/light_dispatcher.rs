//! Device event dispatcher
//!
//! Polls the light job queue, publishes due events to the court's light
//! controller and records the outcome: delivered jobs are deleted, failed
//! ones are pushed back with exponential backoff until their attempts run
//! out.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::ports::DevicePublisher;
use crate::domain::device::LightJob;
use crate::domain::{DomainResult, RepositoryProvider};
use crate::support::retry::RetryConfig;
use crate::support::shutdown::ShutdownSignal;
use crate::support::time::SharedClock;

/// Outcome counts of one poll
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub retried: usize,
    pub exhausted: usize,
}

impl DispatchStats {
    pub fn total(&self) -> usize {
        self.delivered + self.retried + self.exhausted
    }
}

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub batch_size: u64,
    /// A claim older than this is taken over
    pub stale_after: Duration,
    pub retry: RetryConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 16,
            stale_after: Duration::from_secs(60),
            retry: RetryConfig::device_jobs(),
        }
    }
}

pub struct LightDispatcher {
    repos: Arc<dyn RepositoryProvider>,
    publisher: Arc<dyn DevicePublisher>,
    clock: SharedClock,
    config: DispatcherConfig,
}

impl LightDispatcher {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn DevicePublisher>,
        clock: SharedClock,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            repos,
            publisher,
            clock,
            config,
        }
    }

    /// Claim and dispatch every job due now, one at a time.
    pub async fn run_once(&self) -> DomainResult<DispatchStats> {
        let now = self.clock.now();
        let stale_after =
            chrono::Duration::from_std(self.config.stale_after).unwrap_or(chrono::Duration::seconds(60));
        let jobs = self
            .repos
            .light_jobs()
            .claim_due(now, now - stale_after, self.config.batch_size)
            .await?;

        let mut stats = DispatchStats::default();
        for job in jobs {
            self.dispatch(job, &mut stats).await?;
        }
        if stats.total() > 0 {
            debug!(?stats, "Dispatch round finished");
        }
        Ok(stats)
    }

    async fn dispatch(&self, job: LightJob, stats: &mut DispatchStats) -> DomainResult<()> {
        let topic = job.topic();
        let payload = job.payload();
        let queue = self.repos.light_jobs();

        match self.publisher.publish(&topic, &payload).await {
            Ok(()) => {
                queue.complete(&job.id).await?;
                info!(
                    job_id = %job.id,
                    %topic,
                    cmd = ?payload.cmd,
                    booking_id = %payload.booking_id,
                    "💡 Light command delivered"
                );
                metrics::counter!("light_jobs_delivered_total", "kind" => job.key.kind.as_str())
                    .increment(1);
                stats.delivered += 1;
            }
            Err(e) => {
                let attempts = job.attempts + 1;
                let reason = e.to_string();
                let now = self.clock.now();
                if self.config.retry.attempts_exhausted(attempts) {
                    queue.mark_exhausted(&job.id, attempts, &reason, now).await?;
                    error!(
                        job_id = %job.id,
                        %topic,
                        attempts,
                        error = %reason,
                        "Light command gave up"
                    );
                    metrics::counter!("light_jobs_exhausted_total").increment(1);
                    stats.exhausted += 1;
                } else {
                    let backoff = self.config.retry.delay_for_attempt(attempts);
                    let retry_at =
                        now + chrono::Duration::from_std(backoff).unwrap_or(chrono::Duration::seconds(1));
                    queue.retry_later(&job.id, attempts, retry_at, &reason, now).await?;
                    warn!(
                        job_id = %job.id,
                        %topic,
                        attempts,
                        retry_in_ms = backoff.as_millis() as u64,
                        error = %reason,
                        "Light command failed, will retry"
                    );
                    metrics::counter!("light_jobs_retried_total").increment(1);
                    stats.retried += 1;
                }
            }
        }
        Ok(())
    }

    /// Poll until `shutdown` fires. A claimed batch is always finished
    /// before the loop exits.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                batch_size = self.config.batch_size,
                "🔦 Light dispatcher started"
            );

            let mut interval = tokio::time::interval(self.config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.run_once().await {
                            warn!(error = %e, "Light dispatch round failed");
                        }
                    }
                    _ = shutdown.wait() => {
                        info!("🔦 Light dispatcher shutting down");
                        break;
                    }
                }
            }

            info!("🔦 Light dispatcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::{JobKey, JobState, LightCommand, LightEventKind, LightJobQueue};
    use crate::infrastructure::mqtt::RecordingPublisher;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::support::time::{Clock, ManualClock};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        store: Arc<InMemoryStorage>,
        clock: Arc<ManualClock>,
        publisher: Arc<RecordingPublisher>,
        dispatcher: LightDispatcher,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()));
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = LightDispatcher::new(
            store.clone(),
            publisher.clone(),
            clock.clone(),
            DispatcherConfig::default(),
        );
        Fixture {
            store,
            clock,
            publisher,
            dispatcher,
        }
    }

    async fn enqueue(f: &Fixture, kind: LightEventKind, device_key: Option<&str>, in_secs: i64) -> String {
        let now = f.clock.now();
        let job = LightJob::new(
            JobKey::new(42, 7, now, kind),
            3,
            device_key.map(str::to_string),
            now + chrono::Duration::seconds(in_secs),
            now,
        );
        let id = job.id.clone();
        f.store.enqueue(job).await.unwrap();
        id
    }

    #[tokio::test]
    async fn delivers_due_jobs_only() {
        let f = fixture();
        enqueue(&f, LightEventKind::Activate, Some("524f79a3f30e8462"), 0).await;
        let later = enqueue(&f, LightEventKind::Deactivate, Some("524f79a3f30e8462"), 3600).await;

        let stats = f.dispatcher.run_once().await.unwrap();
        assert_eq!(stats.delivered, 1);

        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "field/3/524f79a3f30e8462/light");
        assert_eq!(published[0].1.cmd, LightCommand::On);
        assert_eq!(published[0].1.zone, Some(7));
        assert_eq!(published[0].1.booking_id, "42");
        assert_eq!(f.store.light_job_count(), 1);
        assert!(f.store.find(&later).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blank_device_key_routes_to_default() {
        let f = fixture();
        enqueue(&f, LightEventKind::Deactivate, Some("  "), -10).await;
        f.dispatcher.run_once().await.unwrap();
        assert_eq!(f.publisher.published()[0].0, "field/3/default/light");
    }

    #[tokio::test]
    async fn failures_back_off_then_exhaust() {
        let f = fixture();
        let id = enqueue(&f, LightEventKind::Activate, None, 0).await;
        f.publisher.fail_next(3);

        let stats = f.dispatcher.run_once().await.unwrap();
        assert_eq!(stats.retried, 1);
        let job = f.store.find(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.run_at, f.clock.now() + chrono::Duration::seconds(1));
        assert_eq!(job.updated_at, f.clock.now());

        // Not due yet
        assert_eq!(f.dispatcher.run_once().await.unwrap().total(), 0);

        f.clock.advance(chrono::Duration::seconds(1));
        assert_eq!(f.dispatcher.run_once().await.unwrap().retried, 1);
        let job = f.store.find(&id).await.unwrap().unwrap();
        assert_eq!(job.run_at, f.clock.now() + chrono::Duration::seconds(2));

        f.clock.advance(chrono::Duration::seconds(2));
        assert_eq!(f.dispatcher.run_once().await.unwrap().exhausted, 1);
        let job = f.store.find(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Exhausted);
        assert_eq!(job.attempts, 3);
        assert!(job.last_error.is_some());

        // Exhausted jobs stay put
        f.clock.advance(chrono::Duration::hours(1));
        assert_eq!(f.dispatcher.run_once().await.unwrap().total(), 0);
        assert!(f.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let f = fixture();
        let shutdown = ShutdownSignal::new();
        let handle = Arc::new(f.dispatcher).start(shutdown.clone());
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher should stop")
            .unwrap();
    }
}
