//! Booking transaction manager
//!
//! Validates a booking request, runs the conflict resolver under the
//! per-slot locks, commits the booking with its items, and then schedules
//! the court lights. Status transitions (cancel, confirm, reject, unlock,
//! receipt upload) and the expiry sweep live here too.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use super::conflict_resolver::SlotConflictResolver;
use super::light_scheduler::{LightScheduler, LightWindow};
use super::slot_locks::SlotLocks;
use crate::domain::booking::conflict::{check_ranges, check_total};
use crate::domain::booking::{
    Booking, BookingRequest, BookingRevision, BookingStatus, NewBooking, SlotTime,
};
use crate::domain::court::{Court, SubCourt};
use crate::domain::{ConflictReason, DomainError, DomainResult, RepositoryProvider};
use crate::support::retry::{retry_with_backoff, RetryConfig};
use crate::support::time::SharedClock;

/// Booking rules taken from configuration
#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// How long a pending booking without receipt holds its slots
    pub hold: Duration,
    /// Offset of the venue's local time from UTC
    pub utc_offset: FixedOffset,
    /// Background retries for light jobs whose first submission failed
    pub schedule_retry: RetryConfig,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            hold: Duration::minutes(15),
            utc_offset: FixedOffset::east_opt(7 * 3600).unwrap_or_else(|| Utc.fix()),
            schedule_retry: RetryConfig::default(),
        }
    }
}

/// Who is placing the booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// End user; pending with a payment hold
    User,
    /// Court owner blocking their own slots
    OwnerLock,
}

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    resolver: SlotConflictResolver,
    scheduler: Arc<LightScheduler>,
    locks: Arc<SlotLocks>,
    clock: SharedClock,
    settings: BookingSettings,
}

impl BookingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        scheduler: Arc<LightScheduler>,
        locks: Arc<SlotLocks>,
        clock: SharedClock,
        settings: BookingSettings,
    ) -> Self {
        Self {
            resolver: SlotConflictResolver::new(repos.clone()),
            repos,
            scheduler,
            locks,
            clock,
            settings,
        }
    }

    // ── Placing bookings ───────────────────────────────────────

    /// Book slots for an end user. The booking starts `pending` and holds its
    /// slots until `expired_at` unless a receipt is attached.
    pub async fn create_booking(
        &self,
        user_id: i32,
        request: &BookingRequest,
    ) -> DomainResult<Booking> {
        self.place(user_id, request, Placement::User).await
    }

    /// Block slots on the caller's own court (`out_of_system`, no expiry).
    pub async fn lock_slots(&self, owner_id: i32, request: &BookingRequest) -> DomainResult<Booking> {
        self.place(owner_id, request, Placement::OwnerLock).await
    }

    async fn place(
        &self,
        user_id: i32,
        request: &BookingRequest,
        placement: Placement,
    ) -> DomainResult<Booking> {
        let result = self.try_place(user_id, request, placement).await;
        match &result {
            Ok(booking) => {
                metrics::counter!("bookings_created_total", "status" => booking.status.as_str())
                    .increment(1);
            }
            Err(e) => {
                metrics::counter!("bookings_rejected_total", "reason" => rejection_label(e))
                    .increment(1);
                info!(user_id, error = %e, "Booking request refused");
            }
        }
        result
    }

    async fn try_place(
        &self,
        user_id: i32,
        request: &BookingRequest,
        placement: Placement,
    ) -> DomainResult<Booking> {
        if user_id <= 0 {
            return Err(DomainError::InvalidInput(format!("invalid user id {}", user_id)));
        }
        if request.total_price < 0 {
            return Err(DomainError::InvalidInput(format!(
                "total price must not be negative: {}",
                request.total_price
            )));
        }
        let items = request.parse_items()?;
        let declared_court = request.declared_court_id()?;
        check_ranges(&items)?;

        let sub_court_ids: Vec<i32> = items.iter().map(|i| i.sub_court_id).collect();
        let sub_courts = self.load_sub_courts(&sub_court_ids).await?;
        if placement == Placement::OwnerLock {
            self.ensure_owns_all(user_id, &sub_courts).await?;
        }

        let slots = self
            .locks
            .acquire(items.iter().map(|i| (i.sub_court_id, i.date)))
            .await;

        let court_id = self.resolver.resolve(&items, &sub_courts, declared_court).await?;
        let court = self.load_court(court_id).await?;
        let total_price = check_total(&items, request.total_price)?;

        let now = self.clock.now();
        let (status, expired_at) = match placement {
            Placement::User => (BookingStatus::Pending, Some(now + self.settings.hold)),
            Placement::OwnerLock => (BookingStatus::OutOfSystem, None),
        };
        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let booking = self
            .repos
            .bookings()
            .create_checked(NewBooking {
                user_id,
                court_id,
                note,
                total_price,
                status,
                expired_at,
                created_at: now,
                items,
            })
            .await?;
        drop(slots);

        info!(
            booking_id = booking.id,
            user_id,
            court_id,
            status = %booking.status,
            total_price,
            items = booking.items.len(),
            "📅 Booking committed"
        );

        self.schedule_lights(&booking, &court).await;
        Ok(booking)
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// User withdraws their own pending booking.
    pub async fn cancel_booking(&self, user_id: i32, booking_id: i32) -> DomainResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        if booking.user_id != user_id {
            return Err(DomainError::Forbidden(format!(
                "booking {} does not belong to user {}",
                booking_id, user_id
            )));
        }
        let before = booking.revision();
        booking.cancel()?;
        self.save_transition(&mut booking, &before).await?;
        self.cancel_lights(&booking).await;
        Ok(booking)
    }

    pub async fn confirm_booking(&self, owner_id: i32, booking_id: i32) -> DomainResult<Booking> {
        let mut booking = self.load_owned_booking(owner_id, booking_id).await?;
        let before = booking.revision();
        booking.confirm()?;
        self.save_transition(&mut booking, &before).await?;
        Ok(booking)
    }

    pub async fn reject_booking(&self, owner_id: i32, booking_id: i32) -> DomainResult<Booking> {
        let mut booking = self.load_owned_booking(owner_id, booking_id).await?;
        let before = booking.revision();
        booking.reject()?;
        self.save_transition(&mut booking, &before).await?;
        self.cancel_lights(&booking).await;
        Ok(booking)
    }

    /// Lift an owner block created by [`lock_slots`](Self::lock_slots).
    pub async fn unlock_slots(&self, owner_id: i32, booking_id: i32) -> DomainResult<Booking> {
        let mut booking = self.load_owned_booking(owner_id, booking_id).await?;
        let before = booking.revision();
        booking.release_lock()?;
        self.save_transition(&mut booking, &before).await?;
        self.cancel_lights(&booking).await;
        Ok(booking)
    }

    /// Record an already-hosted payment receipt. The booking stays pending
    /// for the owner to review.
    pub async fn attach_receipt(
        &self,
        user_id: i32,
        booking_id: i32,
        receipt_url: &str,
    ) -> DomainResult<Booking> {
        let url = receipt_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(DomainError::InvalidInput(format!(
                "receipt must be an http(s) URL, got '{}'",
                receipt_url
            )));
        }
        let mut booking = self.load_booking(booking_id).await?;
        if booking.user_id != user_id {
            return Err(DomainError::Forbidden(format!(
                "booking {} does not belong to user {}",
                booking_id, user_id
            )));
        }
        let before = booking.revision();
        booking.attach_receipt(url.to_string())?;
        self.save_transition(&mut booking, &before).await?;
        info!(booking_id, "🧾 Receipt attached");
        Ok(booking)
    }

    /// Owner re-queues the light windows of a booking. Returns the number of
    /// windows scheduled.
    pub async fn trigger_lights(&self, owner_id: i32, booking_id: i32) -> DomainResult<usize> {
        let booking = self.load_owned_booking(owner_id, booking_id).await?;
        if booking.status.is_voided() {
            return Err(DomainError::InvalidState(format!(
                "booking {} is {}, nothing to light",
                booking_id, booking.status
            )));
        }
        let court = self.load_court(booking.court_id).await?;
        let windows = light_windows(&booking, &court, self.settings.utc_offset)?;
        for window in &windows {
            self.scheduler.schedule_window(window).await?;
        }
        Ok(windows.len())
    }

    /// Cancel pending bookings whose payment hold ran out. Returns how many
    /// were cancelled.
    pub async fn expire_overdue(&self) -> DomainResult<usize> {
        let now = self.clock.now();
        let expired = self.repos.bookings().find_expired_pending(now).await?;
        if expired.is_empty() {
            return Ok(0);
        }
        info!(count = expired.len(), "Cancelling unpaid bookings past their hold");

        let mut cancelled = 0;
        for mut booking in expired {
            let before = booking.revision();
            if let Err(e) = booking.cancel() {
                warn!(booking_id = booking.id, error = %e, "Skipping expired booking");
                continue;
            }
            match self.save_transition(&mut booking, &before).await {
                Ok(()) => {}
                Err(DomainError::InvalidState(reason)) => {
                    // Paid or cancelled since the sweep read it
                    debug!(booking_id = booking.id, %reason, "Expired booking changed, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(booking_id = booking.id, error = %e, "Failed to expire booking");
                    continue;
                }
            }
            self.cancel_lights(&booking).await;
            cancelled += 1;
        }
        metrics::counter!("bookings_expired_total").increment(cancelled as u64);
        self.locks.prune();
        Ok(cancelled)
    }

    // ── Helpers ────────────────────────────────────────────────

    async fn load_sub_courts(&self, ids: &[i32]) -> DomainResult<Vec<SubCourt>> {
        let found = self.repos.courts().find_sub_courts(ids).await?;
        for id in ids {
            match found.iter().find(|s| s.id == *id) {
                None => {
                    return Err(DomainError::NotFound {
                        entity: "SubCourt",
                        field: "id",
                        value: id.to_string(),
                    })
                }
                Some(sub) if !sub.is_active => {
                    return Err(DomainError::InvalidState(format!(
                        "sub-court {} is not active",
                        id
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(found)
    }

    async fn load_court(&self, court_id: i32) -> DomainResult<Court> {
        self.repos
            .courts()
            .find_by_id(court_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Court",
                field: "id",
                value: court_id.to_string(),
            })
    }

    async fn load_booking(&self, booking_id: i32) -> DomainResult<Booking> {
        self.repos
            .bookings()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Booking",
                field: "id",
                value: booking_id.to_string(),
            })
    }

    async fn load_owned_booking(&self, owner_id: i32, booking_id: i32) -> DomainResult<Booking> {
        let booking = self.load_booking(booking_id).await?;
        let court = self.load_court(booking.court_id).await?;
        if !court.is_owned_by(owner_id) {
            return Err(DomainError::Forbidden(format!(
                "court {} is not owned by user {}",
                court.id, owner_id
            )));
        }
        Ok(booking)
    }

    async fn ensure_owns_all(&self, owner_id: i32, sub_courts: &[SubCourt]) -> DomainResult<()> {
        let court = self
            .repos
            .courts()
            .find_by_owner(owner_id)
            .await?
            .ok_or_else(|| DomainError::Forbidden(format!("user {} owns no court", owner_id)))?;
        if let Some(foreign) = sub_courts.iter().find(|s| s.court_id != court.id) {
            return Err(DomainError::Forbidden(format!(
                "sub-court {} does not belong to court {}",
                foreign.id, court.id
            )));
        }
        Ok(())
    }

    async fn save_transition(
        &self,
        booking: &mut Booking,
        before: &BookingRevision,
    ) -> DomainResult<()> {
        booking.updated_at = self.clock.now();
        self.repos.bookings().update(booking, before).await?;
        info!(booking_id = booking.id, status = %booking.status, "Booking status changed");
        Ok(())
    }

    /// Enqueue light windows after commit. Each window is submitted once;
    /// a transient failure is retried on a background task so the caller
    /// never waits on backoff. The booking already stands either way.
    async fn schedule_lights(&self, booking: &Booking, court: &Court) {
        let windows = match light_windows(booking, court, self.settings.utc_offset) {
            Ok(windows) => windows,
            Err(e) => {
                error!(booking_id = booking.id, error = %e, "Cannot compute light windows");
                return;
            }
        };
        for window in windows {
            match self.scheduler.schedule_window(&window).await {
                Ok(_) => {}
                Err(e) if e.is_transient() => {
                    warn!(
                        booking_id = booking.id,
                        sub_court_id = window.sub_court_id,
                        error = %e,
                        "Light window not queued, retrying in background"
                    );
                    self.retry_in_background(window);
                }
                Err(e) => schedule_failed(&window, &e),
            }
        }
    }

    fn retry_in_background(&self, window: LightWindow) {
        let scheduler = self.scheduler.clone();
        let retry = self.settings.schedule_retry.clone();
        tokio::spawn(async move {
            let result = retry_with_backoff(
                &retry,
                || scheduler.schedule_window(&window),
                DomainError::is_transient,
                "schedule light window",
            )
            .await;
            if let Err(e) = result {
                schedule_failed(&window, &e);
            }
        });
    }

    async fn cancel_lights(&self, booking: &Booking) {
        for sub_court_id in booking.sub_court_ids() {
            if let Err(e) = self.scheduler.cancel_window(booking.id, sub_court_id).await {
                warn!(booking_id = booking.id, sub_court_id, error = %e, "Failed to cancel light window");
            }
        }
    }
}

fn schedule_failed(window: &LightWindow, e: &DomainError) {
    error!(
        booking_id = window.reservation_id,
        sub_court_id = window.sub_court_id,
        error = %e,
        "Light window not scheduled"
    );
    metrics::counter!("light_schedule_failures_total").increment(1);
}

// ── Pure helpers ───────────────────────────────────────────────

/// Instant of a venue-local date and time of day. `24:00` is midnight of the
/// next day.
pub fn local_instant(
    date: NaiveDate,
    time: SlotTime,
    offset: FixedOffset,
) -> DomainResult<DateTime<Utc>> {
    let local = date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(time.minutes()));
    offset
        .from_local_datetime(&local)
        .single()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| DomainError::InvalidInput(format!("cannot place {} {} in time", date, time)))
}

/// Light windows of a booking. Items on one sub-court that overlap or touch
/// in time share a window; everything else gets its own.
pub fn light_windows(
    booking: &Booking,
    court: &Court,
    offset: FixedOffset,
) -> DomainResult<Vec<LightWindow>> {
    let mut spans = booking
        .items
        .iter()
        .map(|item| {
            Ok((
                item.sub_court_id,
                local_instant(item.date, item.start, offset)?,
                local_instant(item.date, item.end, offset)?,
            ))
        })
        .collect::<DomainResult<Vec<(i32, DateTime<Utc>, DateTime<Utc>)>>>()?;
    spans.sort();

    let mut merged: Vec<(i32, DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(spans.len());
    for (sub_court_id, start, end) in spans {
        match merged.last_mut() {
            Some((last_sub, _, last_end)) if *last_sub == sub_court_id && start <= *last_end => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((sub_court_id, start, end)),
        }
    }

    Ok(merged
        .into_iter()
        .map(|(sub_court_id, start_at, end_at)| LightWindow {
            reservation_id: booking.id,
            court_id: court.id,
            sub_court_id,
            start_at,
            end_at,
            device_key: court.device_key.clone(),
        })
        .collect())
}

fn rejection_label(e: &DomainError) -> &'static str {
    match e {
        DomainError::InvalidInput(_) => "invalid_input",
        DomainError::NotFound { .. } => "not_found",
        DomainError::Forbidden(_) => "forbidden",
        DomainError::InvalidState(_) => "invalid_state",
        DomainError::Storage(_) => "storage",
        DomainError::Conflict(reason) => match reason {
            ConflictReason::InternalOverlap { .. } => "internal_overlap",
            ConflictReason::SlotTaken { .. } => "slot_taken",
            ConflictReason::CrossCourtMismatch => "cross_court_mismatch",
            ConflictReason::PriceMismatch { .. } => "price_mismatch",
        },
    }
}
