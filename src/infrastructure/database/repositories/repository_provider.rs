//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::booking::BookingRepository;
use crate::domain::court::CourtRepository;
use crate::domain::device::LightJobQueue;
use crate::domain::pricing::PriceRepository;
use crate::domain::repositories::RepositoryProvider;

use super::booking_repository::SeaOrmBookingRepository;
use super::court_repository::SeaOrmCourtRepository;
use super::light_job_queue::SeaOrmLightJobQueue;
use super::price_repository::SeaOrmPriceRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let court = repos.courts().find_by_owner(owner_id).await?;
/// let due = repos.light_jobs().claim_due(now, stale_before, 16).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    courts: SeaOrmCourtRepository,
    prices: SeaOrmPriceRepository,
    bookings: SeaOrmBookingRepository,
    light_jobs: SeaOrmLightJobQueue,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            courts: SeaOrmCourtRepository::new(db.clone()),
            prices: SeaOrmPriceRepository::new(db.clone()),
            bookings: SeaOrmBookingRepository::new(db.clone()),
            light_jobs: SeaOrmLightJobQueue::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn courts(&self) -> &dyn CourtRepository {
        &self.courts
    }

    fn prices(&self) -> &dyn PriceRepository {
        &self.prices
    }

    fn bookings(&self) -> &dyn BookingRepository {
        &self.bookings
    }

    fn light_jobs(&self) -> &dyn LightJobQueue {
        &self.light_jobs
    }
}
