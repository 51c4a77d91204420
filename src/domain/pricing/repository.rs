//! Price grid repository interface

use async_trait::async_trait;

use super::model::PriceGridEntry;
use crate::domain::booking::SlotTime;
use crate::domain::DomainResult;

#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// Entries of a court ordered by day then start time. `day = Some(d)`
    /// restricts to that weekday.
    async fn list(&self, court_id: i32, day: Option<u8>) -> DomainResult<Vec<PriceGridEntry>>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<PriceGridEntry>>;

    async fn update_price(&self, id: i32, price_per_hour: i64) -> DomainResult<()>;

    /// Overwrite the price of every entry of `day` lying inside
    /// `[start, end]`. Returns the number of entries changed.
    async fn update_range(
        &self,
        court_id: i32,
        day: u8,
        start: SlotTime,
        end: SlotTime,
        price_per_hour: i64,
    ) -> DomainResult<u64>;

    /// Replace all entries of `day` with `entries` in one transaction.
    async fn replace_day(
        &self,
        court_id: i32,
        day: u8,
        entries: Vec<PriceGridEntry>,
    ) -> DomainResult<u64>;
}
