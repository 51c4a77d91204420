//! Slot conflict resolver
//!
//! Runs the slot rules in a fixed order against the store: range, internal
//! overlap, committed slots, single parent court. The first failure is
//! returned and nothing else is evaluated.

use std::sync::Arc;

use tracing::debug;

use crate::domain::booking::conflict::{
    check_against_existing, check_internal_overlap, check_ranges, dates, single_parent_court,
    sub_court_ids,
};
use crate::domain::booking::RequestedSlot;
use crate::domain::court::SubCourt;
use crate::domain::{DomainResult, RepositoryProvider};

pub struct SlotConflictResolver {
    repos: Arc<dyn RepositoryProvider>,
}

impl SlotConflictResolver {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Accept `requested` or explain why not. On success returns the parent
    /// court shared by `sub_courts` (and by `declared_court`, when given).
    pub async fn resolve(
        &self,
        requested: &[RequestedSlot],
        sub_courts: &[SubCourt],
        declared_court: Option<i32>,
    ) -> DomainResult<i32> {
        check_ranges(requested)?;
        check_internal_overlap(requested)?;

        let existing = self
            .repos
            .bookings()
            .find_active_slots(&sub_court_ids(requested), &dates(requested))
            .await?;
        check_against_existing(requested, &existing)?;

        let court_id = single_parent_court(
            sub_courts
                .iter()
                .map(|s| s.court_id)
                .chain(declared_court),
        )?;
        debug!(court_id, items = requested.len(), "Requested slots are free");
        Ok(court_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, NewBooking, SlotTime};
    use crate::domain::ConflictReason;
    use crate::infrastructure::storage::InMemoryStorage;
    use chrono::Utc;

    fn slot(sub_court_id: i32, start: &str, end: &str) -> RequestedSlot {
        RequestedSlot {
            sub_court_id,
            date: "2026-01-05".parse().unwrap(),
            start: SlotTime::parse(start).unwrap(),
            end: SlotTime::parse(end).unwrap(),
            price: 100_000,
        }
    }

    fn sub_court(id: i32, court_id: i32) -> SubCourt {
        SubCourt {
            id,
            court_id,
            name: format!("Court {id}"),
            is_active: true,
        }
    }

    async fn store_with_booking(items: Vec<RequestedSlot>) -> Arc<InMemoryStorage> {
        let store = Arc::new(InMemoryStorage::new());
        store
            .bookings()
            .create_checked(NewBooking {
                user_id: 1,
                court_id: 1,
                note: None,
                total_price: 0,
                status: BookingStatus::Pending,
                expired_at: None,
                created_at: Utc::now(),
                items,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn first_conflict_wins_in_order() {
        let store = store_with_booking(vec![slot(1, "15:00", "16:00")]).await;
        let resolver = SlotConflictResolver::new(store);
        let subs = [sub_court(1, 1), sub_court(2, 2)];

        // Internal overlap beats slot-taken and cross-court
        let err = resolver
            .resolve(
                &[slot(1, "15:00", "16:00"), slot(1, "15:30", "16:30"), slot(2, "08:00", "09:00")],
                &subs,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err.conflict_reason(), Some(ConflictReason::InternalOverlap { .. })));

        // Slot-taken beats cross-court
        let err = resolver
            .resolve(&[slot(1, "15:30", "16:30"), slot(2, "08:00", "09:00")], &subs, None)
            .await
            .unwrap_err();
        assert!(matches!(err.conflict_reason(), Some(ConflictReason::SlotTaken { .. })));

        let err = resolver
            .resolve(&[slot(1, "16:00", "17:00"), slot(2, "08:00", "09:00")], &subs, None)
            .await
            .unwrap_err();
        assert!(matches!(err.conflict_reason(), Some(ConflictReason::CrossCourtMismatch)));
    }

    #[tokio::test]
    async fn declared_court_must_match() {
        let store = Arc::new(InMemoryStorage::new());
        let resolver = SlotConflictResolver::new(store);
        let subs = [sub_court(1, 4)];
        let items = [slot(1, "10:00", "11:00")];

        assert_eq!(resolver.resolve(&items, &subs, Some(4)).await.unwrap(), 4);
        assert!(matches!(
            resolver.resolve(&items, &subs, Some(5)).await.unwrap_err().conflict_reason(),
            Some(ConflictReason::CrossCourtMismatch)
        ));
    }
}
