//! Booking aggregate: reservation, line items and slot times

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::support::errors::{DomainError, DomainResult};

/// Minutes in a day; also the largest valid [`SlotTime`] (`24:00`).
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time of day at minute resolution, `00:00..=24:00`.
///
/// `24:00` only makes sense as the end of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(u16);

impl SlotTime {
    pub const MIDNIGHT: SlotTime = SlotTime(0);
    pub const END_OF_DAY: SlotTime = SlotTime(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: u16) -> DomainResult<Self> {
        if minutes > MINUTES_PER_DAY {
            return Err(DomainError::InvalidInput(format!(
                "time of day out of range: {} minutes",
                minutes
            )));
        }
        Ok(Self(minutes))
    }

    pub fn hm(hours: u16, minutes: u16) -> DomainResult<Self> {
        if minutes >= 60 {
            return Err(DomainError::InvalidInput(format!(
                "invalid minutes: {}",
                minutes
            )));
        }
        let total = hours
            .checked_mul(60)
            .and_then(|h| h.checked_add(minutes))
            .ok_or_else(|| DomainError::InvalidInput(format!("invalid hours: {}", hours)))?;
        Self::from_minutes(total)
    }

    /// Parse `HH:mm` or `HH:mm:ss`. Seconds must be zero.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let invalid = || DomainError::InvalidInput(format!("invalid time '{}', expected HH:mm", s));
        let mut parts = s.trim().split(':');
        let hours: u16 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minutes: u16 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            if seconds.parse::<u16>().map_err(|_| invalid())? != 0 {
                return Err(invalid());
            }
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::hm(hours, minutes).map_err(|_| invalid())
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`.
pub fn overlaps(a_start: SlotTime, a_end: SlotTime, b_start: SlotTime, b_end: SlotTime) -> bool {
    a_start < b_end && b_start < a_end
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", s)))
}

/// Parse a numeric identifier coming from the request layer.
pub fn parse_id(field: &str, s: &str) -> DomainResult<i32> {
    match s.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(DomainError::InvalidInput(format!("{} is not a valid id: '{}'", field, s))),
    }
}

// ── Status ──────────────────────────────────────────────────────

/// Reservation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting payment proof
    Pending,
    /// Approved by the owner
    Confirmed,
    /// Refused by the owner
    Rejected,
    /// Withdrawn by the user (or swept after expiry)
    Cancelled,
    /// Owner block entered outside the booking flow
    OutOfSystem,
    /// Owner block
    Locked,
}

impl BookingStatus {
    /// Statuses that no longer hold their slots.
    pub const VOIDED: [BookingStatus; 2] = [BookingStatus::Cancelled, BookingStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::OutOfSystem => "out_of_system",
            Self::Locked => "locked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "out_of_system" => Some(Self::OutOfSystem),
            "locked" => Some(Self::Locked),
            _ => None,
        }
    }

    pub fn is_voided(&self) -> bool {
        Self::VOIDED.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected | Self::Cancelled)
    }

    /// Owner-initiated blocks.
    pub fn is_lock(&self) -> bool {
        matches!(self, Self::OutOfSystem | Self::Locked)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Line items ──────────────────────────────────────────────────

/// One contiguous range on one sub-court, as requested (not yet stored).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedSlot {
    pub sub_court_id: i32,
    pub date: NaiveDate,
    pub start: SlotTime,
    pub end: SlotTime,
    pub price: i64,
}

/// A persisted line item that still holds its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedSlot {
    pub booking_id: i32,
    pub sub_court_id: i32,
    pub date: NaiveDate,
    pub start: SlotTime,
    pub end: SlotTime,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingItem {
    pub id: i32,
    pub booking_id: i32,
    pub sub_court_id: i32,
    pub date: NaiveDate,
    pub start: SlotTime,
    pub end: SlotTime,
    pub price: i64,
}

// ── Aggregate ───────────────────────────────────────────────────

/// Reservation aggregate root
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: i32,
    pub user_id: i32,
    pub court_id: i32,
    pub note: Option<String>,
    pub total_price: i64,
    /// Already-hosted receipt image URL
    pub receipt_url: Option<String>,
    pub status: BookingStatus,
    /// After this instant an unpaid pending booking may be swept
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<BookingItem>,
}

/// The mutable part of a booking as it was read. Updates only apply while
/// the stored row still matches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRevision {
    pub status: BookingStatus,
    pub receipt_url: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn revision(&self) -> BookingRevision {
        BookingRevision {
            status: self.status,
            receipt_url: self.receipt_url.clone(),
            expired_at: self.expired_at,
        }
    }

    fn transition(&mut self, to: BookingStatus, allowed_from: &[BookingStatus]) -> DomainResult<()> {
        if !allowed_from.contains(&self.status) {
            return Err(DomainError::InvalidState(format!(
                "booking {} cannot move from {} to {}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn confirm(&mut self) -> DomainResult<()> {
        self.transition(BookingStatus::Confirmed, &[BookingStatus::Pending])?;
        self.expired_at = None;
        Ok(())
    }

    pub fn reject(&mut self) -> DomainResult<()> {
        self.transition(BookingStatus::Rejected, &[BookingStatus::Pending])
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.transition(BookingStatus::Cancelled, &[BookingStatus::Pending])
    }

    /// Lift an owner block.
    pub fn release_lock(&mut self) -> DomainResult<()> {
        self.transition(
            BookingStatus::Cancelled,
            &[BookingStatus::OutOfSystem, BookingStatus::Locked],
        )
    }

    /// Record payment proof. The booking stays pending for owner review and
    /// is no longer subject to the unpaid-expiry sweep.
    pub fn attach_receipt(&mut self, url: String) -> DomainResult<()> {
        if self.status != BookingStatus::Pending {
            return Err(DomainError::InvalidState(format!(
                "receipt can only be attached to a pending booking, booking {} is {}",
                self.id, self.status
            )));
        }
        self.receipt_url = Some(url);
        self.expired_at = None;
        Ok(())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending
            && self.receipt_url.is_none()
            && self.expired_at.is_some_and(|at| at < now)
    }

    /// Distinct sub-courts touched by this booking, in item order.
    pub fn sub_court_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.sub_court_id) {
                ids.push(item.sub_court_id);
            }
        }
        ids
    }
}

/// Everything needed to insert a booking and its items in one unit.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i32,
    pub court_id: i32,
    pub note: Option<String>,
    pub total_price: i64,
    pub status: BookingStatus,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<RequestedSlot>,
}

// ── Inbound request ─────────────────────────────────────────────

/// Booking request as received from the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub note: Option<String>,
    pub total_price: i64,
    #[serde(default)]
    pub supper_court_id: Option<String>,
    pub items: Vec<BookingRequestItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestItem {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Sub-court id
    pub court_id: String,
    /// `HH:mm`
    pub start_time: String,
    /// `HH:mm`
    pub end_time: String,
    pub price: i64,
}

impl BookingRequestItem {
    /// Well-formedness only; range ordering is checked by the resolver.
    pub fn parse(&self) -> DomainResult<RequestedSlot> {
        if self.price < 0 {
            return Err(DomainError::InvalidInput(format!(
                "price must not be negative: {}",
                self.price
            )));
        }
        Ok(RequestedSlot {
            sub_court_id: parse_id("courtId", &self.court_id)?,
            date: parse_date(&self.date)?,
            start: SlotTime::parse(&self.start_time)?,
            end: SlotTime::parse(&self.end_time)?,
            price: self.price,
        })
    }
}

impl BookingRequest {
    pub fn parse_items(&self) -> DomainResult<Vec<RequestedSlot>> {
        if self.items.is_empty() {
            return Err(DomainError::InvalidInput(
                "at least one item is required".to_string(),
            ));
        }
        self.items.iter().map(BookingRequestItem::parse).collect()
    }

    pub fn declared_court_id(&self) -> DomainResult<Option<i32>> {
        self.supper_court_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_id("supperCourtId", s))
            .transpose()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: 7,
            user_id: 1,
            court_id: 1,
            note: None,
            total_price: 100_000,
            receipt_url: None,
            status: BookingStatus::Pending,
            expired_at: Some(now + chrono::Duration::minutes(15)),
            created_at: now,
            updated_at: now,
            items: vec![],
        }
    }

    #[test]
    fn slot_time_parses_common_forms() {
        assert_eq!(SlotTime::parse("15:00").unwrap().minutes(), 900);
        assert_eq!(SlotTime::parse("07:30:00").unwrap().minutes(), 450);
        assert_eq!(SlotTime::parse("24:00").unwrap(), SlotTime::END_OF_DAY);
        assert_eq!(SlotTime::parse("9:05").unwrap().to_string(), "09:05");
    }

    #[test]
    fn slot_time_rejects_garbage() {
        for bad in ["", "15", "25:00", "24:30", "10:60", "aa:bb", "10:00:30", "1:2:0:0", "9999:00"] {
            assert!(
                matches!(SlotTime::parse(bad), Err(DomainError::InvalidInput(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let t = |s| SlotTime::parse(s).unwrap();
        assert!(!overlaps(t("15:00"), t("16:00"), t("16:00"), t("17:00")));
        assert!(overlaps(t("15:00"), t("16:00"), t("15:30"), t("17:00")));
        assert!(overlaps(t("15:00"), t("16:00"), t("14:00"), t("24:00")));
    }

    #[test]
    fn status_roundtrip_and_voided_set() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
            BookingStatus::OutOfSystem,
            BookingStatus::Locked,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert!(BookingStatus::Cancelled.is_voided());
        assert!(BookingStatus::Rejected.is_voided());
        assert!(!BookingStatus::Locked.is_voided());
        assert!(!BookingStatus::Pending.is_terminal());
        assert_eq!(BookingStatus::from_str("paid"), None);
    }

    #[test]
    fn confirm_only_from_pending() {
        let mut b = pending_booking();
        b.confirm().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.expired_at.is_none());
        assert!(matches!(b.cancel(), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn release_lock_requires_a_lock() {
        let mut b = pending_booking();
        assert!(b.release_lock().is_err());
        b.status = BookingStatus::OutOfSystem;
        b.release_lock().unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
    }

    #[test]
    fn receipt_stops_expiry() {
        let mut b = pending_booking();
        let later = b.created_at + chrono::Duration::hours(1);
        assert!(b.is_expired_at(later));
        b.attach_receipt("https://cdn.example/bill.png".into()).unwrap();
        assert!(!b.is_expired_at(later));
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let json = r#"{
            "note": "evening game",
            "totalPrice": 100000,
            "supperCourtId": "3",
            "items": [{"date": "2026-01-05", "courtId": "1", "startTime": "15:00", "endTime": "16:00", "price": 100000}]
        }"#;
        let req: BookingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.declared_court_id().unwrap(), Some(3));
        let items = req.parse_items().unwrap();
        assert_eq!(items[0].sub_court_id, 1);
        assert_eq!(items[0].start.to_string(), "15:00");
    }

    #[test]
    fn malformed_identifiers_are_invalid_input() {
        let item = BookingRequestItem {
            date: "2026-01-05".into(),
            court_id: "abc".into(),
            start_time: "15:00".into(),
            end_time: "16:00".into(),
            price: 1,
        };
        assert!(matches!(item.parse(), Err(DomainError::InvalidInput(_))));

        let req = BookingRequest {
            note: None,
            total_price: 0,
            supper_court_id: None,
            items: vec![],
        };
        assert!(matches!(req.parse_items(), Err(DomainError::InvalidInput(_))));
    }
}
