//! Booking repository interface

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::model::{BookedSlot, Booking, BookingRevision, NewBooking};
use crate::domain::DomainResult;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Items on the given sub-courts and dates whose booking is not voided.
    async fn find_active_slots(
        &self,
        sub_court_ids: &[i32],
        dates: &[NaiveDate],
    ) -> DomainResult<Vec<BookedSlot>>;

    /// Insert the booking and all of its items atomically.
    ///
    /// The slot check is repeated inside the write transaction; a conflict
    /// found there aborts the whole insert with `Conflict(SlotTaken)`.
    async fn create_checked(&self, booking: NewBooking) -> DomainResult<Booking>;

    /// Find booking (with items) by ID
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>>;

    /// Persist status, receipt and expiry changes of an existing booking,
    /// provided the stored row still matches `expected`.
    ///
    /// Fails with `InvalidState` when another write got there first.
    async fn update(&self, booking: &Booking, expected: &BookingRevision) -> DomainResult<()>;

    /// Pending bookings without receipt whose hold ran out before `now`.
    async fn find_expired_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Booking>>;
}
