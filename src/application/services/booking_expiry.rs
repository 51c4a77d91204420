//! Background task that periodically cancels unpaid bookings.
//!
//! Runs in a tokio::spawn loop, checking every `check_interval_secs` for
//! pending bookings without receipt whose hold ran out, cancelling them and
//! dropping their light windows.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::booking::BookingService;
use crate::support::shutdown::ShutdownSignal;

/// Start the booking expiry background task.
pub fn start_booking_expiry_task(
    bookings: Arc<BookingService>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "📅 Booking expiry task started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match bookings.expire_overdue().await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "Expiry sweep finished"),
                        Err(e) => warn!(error = %e, "Booking expiry check error"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("📅 Booking expiry task shutting down");
                    break;
                }
            }
        }

        info!("📅 Booking expiry task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::booking::BookingSettings;
    use crate::application::services::light_scheduler::LightScheduler;
    use crate::application::services::slot_locks::SlotLocks;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::support::time::SystemClock;

    #[tokio::test]
    async fn stops_on_shutdown() {
        let store = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(SystemClock);
        let service = Arc::new(BookingService::new(
            store.clone(),
            Arc::new(LightScheduler::new(store, clock.clone())),
            Arc::new(SlotLocks::new()),
            clock,
            BookingSettings::default(),
        ));
        let shutdown = ShutdownSignal::new();
        let handle = start_booking_expiry_task(service, shutdown.clone(), 3600);

        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("task should stop")
            .unwrap();
    }
}
