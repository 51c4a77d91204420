//! Court repository interface

use async_trait::async_trait;

use super::model::{Court, NewCourt, SubCourt};
use crate::domain::pricing::PriceGridEntry;
use crate::domain::DomainResult;

#[async_trait]
pub trait CourtRepository: Send + Sync {
    /// Insert the court, its sub-courts and its initial price grid in one
    /// transaction. Grid entries carry `court_id = 0`; the store fills in the
    /// generated id.
    async fn create(
        &self,
        court: NewCourt,
        grid: Vec<PriceGridEntry>,
    ) -> DomainResult<(Court, Vec<SubCourt>)>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Court>>;

    /// The court owned by a user (one per owner)
    async fn find_by_owner(&self, owner_id: i32) -> DomainResult<Option<Court>>;

    /// Sub-courts with the given IDs; unknown IDs are simply absent.
    async fn find_sub_courts(&self, ids: &[i32]) -> DomainResult<Vec<SubCourt>>;

    async fn list_sub_courts(&self, court_id: i32) -> DomainResult<Vec<SubCourt>>;

    async fn set_device_key(&self, court_id: i32, device_key: &str) -> DomainResult<()>;
}
