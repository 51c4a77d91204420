//! Slot conflict rules
//!
//! Pure checks over requested and already-booked slots. Each function returns
//! the first conflict it meets; callers run them in order and the whole
//! request is rejected on the first error.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::model::{overlaps, BookedSlot, RequestedSlot};
use crate::support::errors::{ConflictReason, DomainError, DomainResult};

/// Every item must end strictly after it starts.
pub fn check_ranges(requested: &[RequestedSlot]) -> DomainResult<()> {
    match requested.iter().find(|item| item.end <= item.start) {
        Some(item) => Err(DomainError::InvalidInput(format!(
            "start time {} must be before end time {} (sub-court {}, {})",
            item.start, item.end, item.sub_court_id, item.date
        ))),
        None => Ok(()),
    }
}

/// No two requested items may overlap on the same sub-court and date.
pub fn check_internal_overlap(requested: &[RequestedSlot]) -> DomainResult<()> {
    for (i, first) in requested.iter().enumerate() {
        for second in &requested[i + 1..] {
            if first.sub_court_id == second.sub_court_id
                && first.date == second.date
                && overlaps(first.start, first.end, second.start, second.end)
            {
                return Err(DomainError::Conflict(ConflictReason::InternalOverlap {
                    sub_court_id: first.sub_court_id,
                    date: first.date.to_string(),
                }));
            }
        }
    }
    Ok(())
}

/// No requested item may overlap a slot that is still held.
///
/// Voided bookings in `existing` are ignored, so callers may pass a superset.
pub fn check_against_existing(
    requested: &[RequestedSlot],
    existing: &[BookedSlot],
) -> DomainResult<()> {
    for item in requested {
        let taken = existing.iter().any(|booked| {
            !booked.status.is_voided()
                && booked.sub_court_id == item.sub_court_id
                && booked.date == item.date
                && overlaps(item.start, item.end, booked.start, booked.end)
        });
        if taken {
            return Err(DomainError::Conflict(ConflictReason::SlotTaken {
                sub_court_id: item.sub_court_id,
                date: item.date.to_string(),
            }));
        }
    }
    Ok(())
}

/// The single parent court shared by all sub-courts.
pub fn single_parent_court(parent_court_ids: impl IntoIterator<Item = i32>) -> DomainResult<i32> {
    let distinct: BTreeSet<i32> = parent_court_ids.into_iter().collect();
    let mut iter = distinct.into_iter();
    match (iter.next(), iter.next()) {
        (Some(court_id), None) => Ok(court_id),
        (None, _) => Err(DomainError::InvalidInput(
            "no court could be resolved for the request".to_string(),
        )),
        _ => Err(DomainError::Conflict(ConflictReason::CrossCourtMismatch)),
    }
}

/// Server-side total must equal what the client declared.
pub fn check_total(requested: &[RequestedSlot], declared_total: i64) -> DomainResult<i64> {
    let computed = requested
        .iter()
        .try_fold(0i64, |sum, item| sum.checked_add(item.price))
        .ok_or_else(|| DomainError::InvalidInput("item prices exceed the supported total".to_string()))?;
    if computed != declared_total {
        return Err(DomainError::Conflict(ConflictReason::PriceMismatch {
            declared: declared_total,
            computed,
        }));
    }
    Ok(computed)
}

/// Distinct sub-courts referenced by the request, sorted.
pub fn sub_court_ids(requested: &[RequestedSlot]) -> Vec<i32> {
    requested
        .iter()
        .map(|item| item.sub_court_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct dates referenced by the request, sorted.
pub fn dates(requested: &[RequestedSlot]) -> Vec<NaiveDate> {
    requested
        .iter()
        .map(|item| item.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
