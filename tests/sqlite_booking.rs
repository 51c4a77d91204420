//! End-to-end booking flows against an in-memory SQLite database.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use court_booking::application::services::{DispatcherConfig, LightDispatcher};
use court_booking::config::AppConfig;
use court_booking::domain::booking::{BookingRequest, BookingRequestItem, BookingStatus};
use court_booking::domain::device::{JobKey, JobState, LightEventKind};
use court_booking::domain::{ConflictReason, DomainError, RepositoryProvider};
use court_booking::infrastructure::mqtt::RecordingPublisher;
use court_booking::server::Services;
use court_booking::support::time::{Clock, ManualClock};
use court_booking::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};

struct Env {
    repos: Arc<SeaOrmRepositoryProvider>,
    clock: Arc<ManualClock>,
    services: Services,
    /// Sub-courts of the court owned by user 10
    subs: Vec<i32>,
    /// Sub-court of the court owned by user 20
    foreign_sub: i32,
}

async fn env() -> Env {
    let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    run_migrations(&db).await.unwrap();
    let repos = Arc::new(SeaOrmRepositoryProvider::new(db));
    // 08:00 at the venue (+07:00)
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 5, 1, 0, 0).unwrap()));
    let services = Services::build(repos.clone(), clock.clone(), &AppConfig::default()).unwrap();

    let (_, subs) = services
        .pricing
        .register_court(10, "Riverside", &["Court 1", "Court 2"])
        .await
        .unwrap();
    let (_, foreign) = services
        .pricing
        .register_court(20, "Hilltop", &["Main"])
        .await
        .unwrap();

    Env {
        repos,
        clock,
        services,
        subs: subs.iter().map(|s| s.id).collect(),
        foreign_sub: foreign[0].id,
    }
}

fn item(sub_court_id: i32, start: &str, end: &str, price: i64) -> BookingRequestItem {
    BookingRequestItem {
        date: "2026-01-05".into(),
        court_id: sub_court_id.to_string(),
        start_time: start.into(),
        end_time: end.into(),
        price,
    }
}

fn request(total_price: i64, items: Vec<BookingRequestItem>) -> BookingRequest {
    BookingRequest {
        note: None,
        total_price,
        supper_court_id: None,
        items,
    }
}

#[tokio::test]
async fn same_slot_cannot_be_booked_twice() {
    let env = env().await;
    let first = env
        .services
        .bookings
        .create_booking(1, &request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();
    assert_eq!(first.status, BookingStatus::Pending);
    assert_eq!(first.items.len(), 1);

    let err = env
        .services
        .bookings
        .create_booking(2, &request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]))
        .await
        .unwrap_err();
    assert!(matches!(err.conflict_reason(), Some(ConflictReason::SlotTaken { .. })));

    // The other sub-court is still free
    env.services
        .bookings
        .create_booking(2, &request(100_000, vec![item(env.subs[1], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancelled_booking_frees_its_slot() {
    let env = env().await;
    let booking = env
        .services
        .bookings
        .create_booking(1, &request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();
    env.services.bookings.cancel_booking(1, booking.id).await.unwrap();

    env.services
        .bookings
        .create_booking(2, &request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();
}

#[tokio::test]
async fn price_mismatch_is_rejected_before_any_write() {
    let env = env().await;
    let err = env
        .services
        .bookings
        .create_booking(
            1,
            &request(
                150_000,
                vec![item(env.subs[0], "15:00", "16:00", 70_000), item(env.subs[0], "16:00", "17:00", 70_000)],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.conflict_reason(),
        Some(&ConflictReason::PriceMismatch { declared: 150_000, computed: 140_000 })
    );

    let date = "2026-01-05".parse().unwrap();
    let active = env.repos.bookings().find_active_slots(&[env.subs[0]], &[date]).await.unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn foreign_owner_cannot_lock() {
    let env = env().await;
    let err = env
        .services
        .bookings
        .lock_slots(20, &request(0, vec![item(env.subs[0], "15:00", "16:00", 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let date = "2026-01-05".parse().unwrap();
    let active = env.repos.bookings().find_active_slots(&[env.subs[0]], &[date]).await.unwrap();
    assert!(active.is_empty());

    let lock = env
        .services
        .bookings
        .lock_slots(20, &request(0, vec![item(env.foreign_sub, "15:00", "16:00", 0)]))
        .await
        .unwrap();
    assert_eq!(lock.status, BookingStatus::OutOfSystem);
    assert!(lock.expired_at.is_none());
}

#[tokio::test]
async fn scheduling_is_idempotent_and_cancel_is_safe() {
    let env = env().await;
    let booking = env
        .services
        .bookings
        .create_booking(1, &request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();

    // Re-trigger replaces the queued jobs instead of adding new ones
    assert_eq!(env.services.bookings.trigger_lights(10, booking.id).await.unwrap(), 1);

    let queue = env.repos.light_jobs();
    let start = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
    let [on, off] = JobKey::window(booking.id, env.subs[0], start);
    let on_job = queue.find(&on.job_id()).await.unwrap().unwrap();
    let off_job = queue.find(&off.job_id()).await.unwrap().unwrap();
    assert_eq!(on_job.run_at, Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap());
    assert_eq!(off_job.run_at, Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap());
    assert_eq!(on_job.state, JobState::Queued);

    assert_eq!(env.services.scheduler.cancel_window(booking.id, env.subs[0]).await.unwrap(), 2);
    assert_eq!(env.services.scheduler.cancel_window(booking.id, env.subs[0]).await.unwrap(), 0);
    assert!(queue.find(&on.job_id()).await.unwrap().is_none());
}

#[tokio::test]
async fn dispatcher_delivers_retries_and_exhausts() {
    let env = env().await;
    let booking = env
        .services
        .bookings
        .create_booking(1, &request(100_000, vec![item(env.subs[1], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();

    let publisher = Arc::new(RecordingPublisher::new());
    let dispatcher = LightDispatcher::new(
        env.repos.clone(),
        publisher.clone(),
        env.clock.clone(),
        DispatcherConfig::default(),
    );

    // Nothing due before 15:00 local
    assert_eq!(dispatcher.run_once().await.unwrap().total(), 0);

    env.clock.set(Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap());
    let stats = dispatcher.run_once().await.unwrap();
    assert_eq!(stats.delivered, 1);
    let (topic, payload) = publisher.published()[0].clone();
    let court_id = env.repos.courts().find_by_owner(10).await.unwrap().unwrap().id;
    assert_eq!(topic, format!("field/{}/default/light", court_id));
    assert_eq!(payload.booking_id, booking.id.to_string());

    let window_start = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
    let on = JobKey::new(booking.id, env.subs[1], window_start, LightEventKind::Activate);
    assert!(env.repos.light_jobs().find(&on.job_id()).await.unwrap().is_none());

    // OFF fails every time
    publisher.fail_next(usize::MAX);
    env.clock.set(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap());
    for _ in 0..3 {
        dispatcher.run_once().await.unwrap();
        env.clock.advance(Duration::seconds(5));
    }
    let off = JobKey::new(booking.id, env.subs[1], window_start, LightEventKind::Deactivate);
    let job = env.repos.light_jobs().find(&off.job_id()).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Exhausted);
    assert_eq!(job.attempts, 3);
    assert!(env.clock.now() > job.run_at);
    assert_eq!(job.updated_at, env.clock.now() - Duration::seconds(5));
}

#[tokio::test]
async fn concurrent_bookings_of_one_slot_commit_once() {
    let env = env().await;
    let first = request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]);
    let second = request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]);

    let (a, b) = tokio::join!(
        env.services.bookings.create_booking(1, &first),
        env.services.bookings.create_booking(2, &second)
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let date = "2026-01-05".parse().unwrap();
    let active = env.repos.bookings().find_active_slots(&[env.subs[0]], &[date]).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn items_a_week_apart_get_their_own_windows() {
    let env = env().await;
    let mut next_week = item(env.subs[0], "15:00", "16:00", 100_000);
    next_week.date = "2026-01-12".into();
    let booking = env
        .services
        .bookings
        .create_booking(
            1,
            &request(200_000, vec![item(env.subs[0], "15:00", "16:00", 100_000), next_week]),
        )
        .await
        .unwrap();

    let queue = env.repos.light_jobs();
    for day in [5, 12] {
        let start = Utc.with_ymd_and_hms(2026, 1, day, 8, 0, 0).unwrap();
        let [on, off] = JobKey::window(booking.id, env.subs[0], start);
        assert_eq!(queue.find(&on.job_id()).await.unwrap().unwrap().run_at, start);
        assert_eq!(
            queue.find(&off.job_id()).await.unwrap().unwrap().run_at,
            start + Duration::hours(1)
        );
    }

    assert_eq!(env.services.scheduler.cancel_window(booking.id, env.subs[0]).await.unwrap(), 4);
}

#[tokio::test]
async fn status_write_from_a_stale_read_is_refused() {
    let env = env().await;
    let booking = env
        .services
        .bookings
        .create_booking(1, &request(100_000, vec![item(env.subs[0], "15:00", "16:00", 100_000)]))
        .await
        .unwrap();

    let mut stale = env.repos.bookings().find_by_id(booking.id).await.unwrap().unwrap();
    env.services
        .bookings
        .attach_receipt(1, booking.id, "https://cdn.example/bill.png")
        .await
        .unwrap();

    let before = stale.revision();
    stale.cancel().unwrap();
    let err = env.repos.bookings().update(&stale, &before).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    let stored = env.repos.bookings().find_by_id(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert_eq!(stored.receipt_url.as_deref(), Some("https://cdn.example/bill.png"));

    // A fresh read goes through
    let confirmed = env.services.bookings.confirm_booking(10, booking.id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
}
