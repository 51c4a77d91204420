//! Price grid: per-court, per-weekday half-hour price table

use chrono::{Datelike, NaiveDate};

use crate::domain::booking::{overlaps, SlotTime};
use crate::support::errors::{DomainError, DomainResult};

/// Width of one grid slot
pub const SLOT_MINUTES: u16 = 30;
/// Grid slots per day (00:00-24:00)
pub const SLOTS_PER_DAY: u16 = 48;
/// 0 = Sunday .. 6 = Saturday
pub const DAYS_PER_WEEK: u8 = 7;

/// One row of a court's price table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceGridEntry {
    /// 0 until persisted
    pub id: i32,
    pub court_id: i32,
    /// `None` applies to every day
    pub day_of_week: Option<u8>,
    pub start: SlotTime,
    pub end: SlotTime,
    pub price_per_hour: i64,
}

impl PriceGridEntry {
    pub fn applies_to(&self, day_of_week: u8) -> bool {
        self.day_of_week.map_or(true, |d| d == day_of_week)
    }

    /// Whether `[start, end]` fully contains this entry.
    pub fn within(&self, start: SlotTime, end: SlotTime) -> bool {
        start <= self.start && self.end <= end
    }
}

pub fn validate_day_of_week(day: u8) -> DomainResult<u8> {
    if day >= DAYS_PER_WEEK {
        return Err(DomainError::InvalidInput(format!(
            "day of week must be 0 (Sunday) to 6 (Saturday), got {}",
            day
        )));
    }
    Ok(day)
}

/// Day-of-week index used by the grid (0 = Sunday).
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Initial grid for a new court: 7 days × 48 half-hour slots at one price.
pub fn generate_grid(court_id: i32, default_price_per_hour: i64) -> Vec<PriceGridEntry> {
    let mut grid = Vec::with_capacity(DAYS_PER_WEEK as usize * SLOTS_PER_DAY as usize);
    for day in 0..DAYS_PER_WEEK {
        for slot in 0..SLOTS_PER_DAY {
            grid.push(PriceGridEntry {
                id: 0,
                court_id,
                day_of_week: Some(day),
                start: SlotTime::from_minutes(slot * SLOT_MINUTES).unwrap_or(SlotTime::MIDNIGHT),
                end: SlotTime::from_minutes((slot + 1) * SLOT_MINUTES)
                    .unwrap_or(SlotTime::END_OF_DAY),
                price_per_hour: default_price_per_hour,
            });
        }
    }
    grid
}

/// Price a segment on a given date from the court's grid.
///
/// Entries for the specific weekday win; "any day" entries are used only when
/// the weekday has none. Every minute of the segment must be covered.
pub fn quote(
    entries: &[PriceGridEntry],
    date: NaiveDate,
    start: SlotTime,
    end: SlotTime,
) -> DomainResult<i64> {
    if end <= start {
        return Err(DomainError::InvalidInput(format!(
            "start time {} must be before end time {}",
            start, end
        )));
    }
    let day = day_of_week(date);
    let specific: Vec<&PriceGridEntry> = entries
        .iter()
        .filter(|e| e.day_of_week == Some(day))
        .collect();
    let candidates: Vec<&PriceGridEntry> = if specific.is_empty() {
        entries.iter().filter(|e| e.day_of_week.is_none()).collect()
    } else {
        specific
    };

    let mut covered_minutes: i64 = 0;
    let mut minute_price_sum: i64 = 0;
    for entry in candidates {
        if !overlaps(start, end, entry.start, entry.end) {
            continue;
        }
        let from = start.max(entry.start).minutes() as i64;
        let to = end.min(entry.end).minutes() as i64;
        covered_minutes += to - from;
        minute_price_sum = (to - from)
            .checked_mul(entry.price_per_hour)
            .and_then(|part| minute_price_sum.checked_add(part))
            .ok_or_else(|| {
                DomainError::InvalidInput(format!("price of {} {}-{} is out of range", date, start, end))
            })?;
    }

    let wanted = (end.minutes() - start.minutes()) as i64;
    if covered_minutes != wanted {
        return Err(DomainError::InvalidInput(format!(
            "no complete price configuration for {} {}-{}",
            date, start, end
        )));
    }
    Ok(minute_price_sum / 60)
}
