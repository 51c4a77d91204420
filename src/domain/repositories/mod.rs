//! Repository traits for the domain layer
//!
//! `RepositoryProvider` gives unified access to all per-aggregate
//! repositories. Consumers request only the repository they need:
//!
//! ```ignore
//! async fn handle(repos: &dyn RepositoryProvider) {
//!     let court = repos.courts().find_by_id(1).await?;
//!     let slots = repos.bookings().find_active_slots(&[1], &[date]).await?;
//! }
//! ```

use super::booking::BookingRepository;
use super::court::CourtRepository;
use super::device::LightJobQueue;
use super::pricing::PriceRepository;

pub use crate::support::errors::DomainResult;

pub trait RepositoryProvider: Send + Sync {
    fn courts(&self) -> &dyn CourtRepository;
    fn prices(&self) -> &dyn PriceRepository;
    fn bookings(&self) -> &dyn BookingRepository;
    fn light_jobs(&self) -> &dyn LightJobQueue;
}
