//! In-memory storage implementation

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::booking::conflict::check_against_existing;
use crate::domain::booking::{
    BookedSlot, Booking, BookingItem, BookingRepository, BookingRevision, BookingStatus, NewBooking,
    SlotTime,
};
use crate::domain::court::{Court, CourtRepository, NewCourt, SubCourt};
use crate::domain::device::{EnqueueOutcome, JobState, LightJob, LightJobQueue};
use crate::domain::pricing::{PriceGridEntry, PriceRepository};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::{DomainError, DomainResult};

/// In-memory storage for development and testing
pub struct InMemoryStorage {
    courts: DashMap<i32, Court>,
    sub_courts: DashMap<i32, SubCourt>,
    prices: DashMap<i32, PriceGridEntry>,
    bookings: DashMap<i32, Booking>,
    light_jobs: DashMap<String, LightJob>,
    court_counter: AtomicI32,
    sub_court_counter: AtomicI32,
    price_counter: AtomicI32,
    booking_counter: AtomicI32,
    item_counter: AtomicI32,
    /// Serializes check-and-insert of bookings
    booking_write: Mutex<()>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            courts: DashMap::new(),
            sub_courts: DashMap::new(),
            prices: DashMap::new(),
            bookings: DashMap::new(),
            light_jobs: DashMap::new(),
            court_counter: AtomicI32::new(1),
            sub_court_counter: AtomicI32::new(1),
            price_counter: AtomicI32::new(1),
            booking_counter: AtomicI32::new(1),
            item_counter: AtomicI32::new(1),
            booking_write: Mutex::new(()),
        }
    }

    fn next(counter: &AtomicI32) -> i32 {
        counter.fetch_add(1, Ordering::SeqCst)
    }

    fn insert_price(&self, court_id: i32, entry: &PriceGridEntry) {
        let id = Self::next(&self.price_counter);
        self.prices.insert(
            id,
            PriceGridEntry {
                id,
                court_id,
                ..entry.clone()
            },
        );
    }

    fn active_slots(&self, sub_court_ids: &[i32], dates: &[NaiveDate]) -> Vec<BookedSlot> {
        let mut slots = Vec::new();
        for booking in self.bookings.iter() {
            if booking.status.is_voided() {
                continue;
            }
            for item in &booking.items {
                if sub_court_ids.contains(&item.sub_court_id) && dates.contains(&item.date) {
                    slots.push(BookedSlot {
                        booking_id: booking.id,
                        sub_court_id: item.sub_court_id,
                        date: item.date,
                        start: item.start,
                        end: item.end,
                        status: booking.status,
                    });
                }
            }
        }
        slots
    }

    /// Number of stored light jobs, whatever their state.
    pub fn light_job_count(&self) -> usize {
        self.light_jobs.len()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryStorage {
    fn courts(&self) -> &dyn CourtRepository {
        self
    }

    fn prices(&self) -> &dyn PriceRepository {
        self
    }

    fn bookings(&self) -> &dyn BookingRepository {
        self
    }

    fn light_jobs(&self) -> &dyn LightJobQueue {
        self
    }
}

// ── Courts ──────────────────────────────────────────────────────

#[async_trait]
impl CourtRepository for InMemoryStorage {
    async fn create(
        &self,
        new_court: NewCourt,
        grid: Vec<PriceGridEntry>,
    ) -> DomainResult<(Court, Vec<SubCourt>)> {
        if self.courts.iter().any(|c| c.owner_id == new_court.owner_id) {
            return Err(DomainError::InvalidState(format!(
                "user {} already owns a court",
                new_court.owner_id
            )));
        }
        let court = Court {
            id: Self::next(&self.court_counter),
            owner_id: new_court.owner_id,
            name: new_court.name,
            device_key: None,
            is_active: true,
            created_at: new_court.created_at,
        };
        let sub_courts: Vec<SubCourt> = new_court
            .sub_court_names
            .into_iter()
            .map(|name| SubCourt {
                id: Self::next(&self.sub_court_counter),
                court_id: court.id,
                name,
                is_active: true,
            })
            .collect();

        self.courts.insert(court.id, court.clone());
        for sub_court in &sub_courts {
            self.sub_courts.insert(sub_court.id, sub_court.clone());
        }
        for entry in &grid {
            self.insert_price(court.id, entry);
        }
        Ok((court, sub_courts))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Court>> {
        Ok(self.courts.get(&id).map(|c| c.clone()))
    }

    async fn find_by_owner(&self, owner_id: i32) -> DomainResult<Option<Court>> {
        Ok(self
            .courts
            .iter()
            .find(|c| c.owner_id == owner_id)
            .map(|c| c.clone()))
    }

    async fn find_sub_courts(&self, ids: &[i32]) -> DomainResult<Vec<SubCourt>> {
        let mut found: Vec<SubCourt> = ids
            .iter()
            .filter_map(|id| self.sub_courts.get(id).map(|s| s.clone()))
            .collect();
        found.sort_by_key(|s| s.id);
        found.dedup_by_key(|s| s.id);
        Ok(found)
    }

    async fn list_sub_courts(&self, court_id: i32) -> DomainResult<Vec<SubCourt>> {
        let mut found: Vec<SubCourt> = self
            .sub_courts
            .iter()
            .filter(|s| s.court_id == court_id)
            .map(|s| s.clone())
            .collect();
        found.sort_by_key(|s| s.id);
        Ok(found)
    }

    async fn set_device_key(&self, court_id: i32, device_key: &str) -> DomainResult<()> {
        match self.courts.get_mut(&court_id) {
            Some(mut court) => {
                court.device_key = Some(device_key.to_string());
                Ok(())
            }
            None => Err(DomainError::NotFound {
                entity: "Court",
                field: "id",
                value: court_id.to_string(),
            }),
        }
    }
}

// ── Prices ──────────────────────────────────────────────────────

#[async_trait]
impl PriceRepository for InMemoryStorage {
    async fn list(&self, court_id: i32, day: Option<u8>) -> DomainResult<Vec<PriceGridEntry>> {
        let mut entries: Vec<PriceGridEntry> = self
            .prices
            .iter()
            .filter(|e| e.court_id == court_id && day.map_or(true, |d| e.day_of_week == Some(d)))
            .map(|e| e.clone())
            .collect();
        entries.sort_by_key(|e| (e.day_of_week, e.start, e.id));
        Ok(entries)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<PriceGridEntry>> {
        Ok(self.prices.get(&id).map(|e| e.clone()))
    }

    async fn update_price(&self, id: i32, price_per_hour: i64) -> DomainResult<()> {
        match self.prices.get_mut(&id) {
            Some(mut entry) => {
                entry.price_per_hour = price_per_hour;
                Ok(())
            }
            None => Err(DomainError::NotFound {
                entity: "PriceGridEntry",
                field: "id",
                value: id.to_string(),
            }),
        }
    }

    async fn update_range(
        &self,
        court_id: i32,
        day: u8,
        start: SlotTime,
        end: SlotTime,
        price_per_hour: i64,
    ) -> DomainResult<u64> {
        let mut changed = 0;
        for mut entry in self.prices.iter_mut() {
            if entry.court_id == court_id
                && entry.day_of_week == Some(day)
                && entry.within(start, end)
            {
                entry.price_per_hour = price_per_hour;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn replace_day(
        &self,
        court_id: i32,
        day: u8,
        entries: Vec<PriceGridEntry>,
    ) -> DomainResult<u64> {
        self.prices
            .retain(|_, e| !(e.court_id == court_id && e.day_of_week == Some(day)));
        for entry in &entries {
            self.insert_price(
                court_id,
                &PriceGridEntry {
                    day_of_week: Some(day),
                    ..entry.clone()
                },
            );
        }
        Ok(entries.len() as u64)
    }
}

// ── Bookings ────────────────────────────────────────────────────

#[async_trait]
impl BookingRepository for InMemoryStorage {
    async fn find_active_slots(
        &self,
        sub_court_ids: &[i32],
        dates: &[NaiveDate],
    ) -> DomainResult<Vec<BookedSlot>> {
        Ok(self.active_slots(sub_court_ids, dates))
    }

    async fn create_checked(&self, new_booking: NewBooking) -> DomainResult<Booking> {
        let _guard = self
            .booking_write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let sub_court_ids: Vec<i32> = new_booking.items.iter().map(|i| i.sub_court_id).collect();
        let dates: Vec<NaiveDate> = new_booking.items.iter().map(|i| i.date).collect();
        check_against_existing(&new_booking.items, &self.active_slots(&sub_court_ids, &dates))?;

        let id = Self::next(&self.booking_counter);
        let items = new_booking
            .items
            .into_iter()
            .map(|slot| BookingItem {
                id: Self::next(&self.item_counter),
                booking_id: id,
                sub_court_id: slot.sub_court_id,
                date: slot.date,
                start: slot.start,
                end: slot.end,
                price: slot.price,
            })
            .collect();
        let booking = Booking {
            id,
            user_id: new_booking.user_id,
            court_id: new_booking.court_id,
            note: new_booking.note,
            total_price: new_booking.total_price,
            receipt_url: None,
            status: new_booking.status,
            expired_at: new_booking.expired_at,
            created_at: new_booking.created_at,
            updated_at: new_booking.created_at,
            items,
        };
        self.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn update(&self, booking: &Booking, expected: &BookingRevision) -> DomainResult<()> {
        match self.bookings.get_mut(&booking.id) {
            Some(stored) if stored.revision() != *expected => Err(DomainError::InvalidState(format!(
                "booking {} was changed by another request",
                booking.id
            ))),
            Some(mut stored) => {
                stored.status = booking.status;
                stored.receipt_url = booking.receipt_url.clone();
                stored.expired_at = booking.expired_at;
                stored.updated_at = booking.updated_at;
                Ok(())
            }
            None => Err(DomainError::NotFound {
                entity: "Booking",
                field: "id",
                value: booking.id.to_string(),
            }),
        }
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Booking>> {
        let mut expired: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending && b.is_expired_at(now))
            .map(|b| b.clone())
            .collect();
        expired.sort_by_key(|b| b.id);
        Ok(expired)
    }
}

// ── Light jobs ──────────────────────────────────────────────────

#[async_trait]
impl LightJobQueue for InMemoryStorage {
    async fn enqueue(&self, job: LightJob) -> DomainResult<EnqueueOutcome> {
        match self.light_jobs.entry(job.id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().state == JobState::Dispatching {
                    return Ok(EnqueueOutcome::InFlight);
                }
                let created_at = existing.get().created_at;
                existing.insert(LightJob { created_at, ..job });
                Ok(EnqueueOutcome::Replaced)
            }
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(EnqueueOutcome::Inserted)
            }
        }
    }

    async fn remove_for_sub_court(&self, reservation_id: i32, sub_court_id: i32) -> DomainResult<u64> {
        let before = self.light_jobs.len();
        self.light_jobs.retain(|_, job| {
            job.state == JobState::Dispatching
                || job.key.reservation_id != reservation_id
                || job.key.sub_court_id != sub_court_id
        });
        Ok((before - self.light_jobs.len()) as u64)
    }

    async fn find(&self, job_id: &str) -> DomainResult<Option<LightJob>> {
        Ok(self.light_jobs.get(job_id).map(|j| j.clone()))
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<LightJob>> {
        let is_due = |job: &LightJob| match job.state {
            JobState::Queued => job.run_at <= now,
            JobState::Dispatching => job.updated_at < stale_before,
            JobState::Exhausted => false,
        };

        let mut candidates: Vec<(DateTime<Utc>, String)> = self
            .light_jobs
            .iter()
            .filter(|j| is_due(j.value()))
            .map(|j| (j.run_at, j.id.clone()))
            .collect();
        candidates.sort();

        let mut claimed = Vec::new();
        for (_, id) in candidates {
            if claimed.len() as u64 >= limit {
                break;
            }
            if let Some(mut job) = self.light_jobs.get_mut(&id) {
                if !is_due(job.value()) {
                    continue;
                }
                job.state = JobState::Dispatching;
                job.updated_at = now;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete(&self, job_id: &str) -> DomainResult<()> {
        self.light_jobs
            .remove_if(job_id, |_, job| job.state == JobState::Dispatching);
        Ok(())
    }

    async fn retry_later(
        &self,
        job_id: &str,
        attempts: u32,
        retry_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(mut job) = self.light_jobs.get_mut(job_id) {
            if job.state == JobState::Dispatching {
                job.state = JobState::Queued;
                job.attempts = attempts;
                job.run_at = retry_at;
                job.last_error = Some(error.to_string());
                job.updated_at = now;
            }
        }
        Ok(())
    }

    async fn mark_exhausted(
        &self,
        job_id: &str,
        attempts: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(mut job) = self.light_jobs.get_mut(job_id) {
            job.state = JobState::Exhausted;
            job.attempts = attempts;
            job.last_error = Some(error.to_string());
            job.updated_at = now;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::{JobKey, LightEventKind};
    use chrono::{Duration, TimeZone};

    fn job(rid: i32, fire_at: DateTime<Utc>, now: DateTime<Utc>) -> LightJob {
        LightJob::new(
            JobKey::new(rid, 1, now, LightEventKind::Activate),
            1,
            None,
            fire_at,
            now,
        )
    }

    #[tokio::test]
    async fn enqueue_replaces_queued_and_skips_in_flight() {
        let store = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();

        assert_eq!(store.enqueue(job(1, now, now)).await.unwrap(), EnqueueOutcome::Inserted);
        let later = now + Duration::hours(1);
        assert_eq!(store.enqueue(job(1, later, now)).await.unwrap(), EnqueueOutcome::Replaced);
        assert_eq!(store.light_job_count(), 1);

        let claimed = store.claim_due(later, now, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(store.enqueue(job(1, later, now)).await.unwrap(), EnqueueOutcome::InFlight);
        assert_eq!(store.remove_for_sub_court(1, 1).await.unwrap(), 0);
        assert_eq!(store.light_job_count(), 1);
    }

    #[tokio::test]
    async fn removal_covers_every_window_of_the_sub_court() {
        let store = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let next_week = now + Duration::days(7);
        for (sub_court_id, window_start) in [(1, now), (1, next_week), (2, now)] {
            for key in JobKey::window(7, sub_court_id, window_start) {
                store.enqueue(LightJob::new(key, 1, None, window_start, now)).await.unwrap();
            }
        }
        assert_eq!(store.light_job_count(), 6);

        assert_eq!(store.remove_for_sub_court(7, 1).await.unwrap(), 4);
        assert_eq!(store.light_job_count(), 2);
        assert_eq!(store.remove_for_sub_court(7, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failure_bookkeeping_uses_the_given_instant() {
        let store = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        store.enqueue(job(1, now, now)).await.unwrap();
        let claimed = store.claim_due(now, now, 1).await.unwrap();

        let failed_at = now + Duration::seconds(3);
        store
            .retry_later(&claimed[0].id, 1, failed_at + Duration::seconds(1), "timeout", failed_at)
            .await
            .unwrap();
        let queued = store.find(&claimed[0].id).await.unwrap().unwrap();
        assert_eq!(queued.state, JobState::Queued);
        assert_eq!(queued.updated_at, failed_at);

        let gave_up_at = failed_at + Duration::seconds(10);
        store.mark_exhausted(&claimed[0].id, 3, "timeout", gave_up_at).await.unwrap();
        assert_eq!(store.find(&claimed[0].id).await.unwrap().unwrap().updated_at, gave_up_at);
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_stale() {
        let store = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        store.enqueue(job(1, now, now)).await.unwrap();
        store.enqueue(job(2, now + Duration::hours(2), now)).await.unwrap();

        let first = store.claim_due(now, now - Duration::seconds(60), 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(store.claim_due(now, now - Duration::seconds(60), 10).await.unwrap().is_empty());

        // Holder died: reclaimed once the claim is older than the stale cutoff
        let much_later = now + Duration::minutes(5);
        let again = store
            .claim_due(much_later, much_later - Duration::seconds(60), 10)
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, first[0].id);
    }
}
