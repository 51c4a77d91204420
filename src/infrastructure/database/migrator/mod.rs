//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_courts;
mod m20260101_000002_create_sub_courts;
mod m20260101_000003_create_court_prices;
mod m20260101_000004_create_bookings;
mod m20260101_000005_create_booking_items;
mod m20260101_000006_create_device_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_courts::Migration),
            Box::new(m20260101_000002_create_sub_courts::Migration),
            Box::new(m20260101_000003_create_court_prices::Migration),
            Box::new(m20260101_000004_create_bookings::Migration),
            Box::new(m20260101_000005_create_booking_items::Migration),
            Box::new(m20260101_000006_create_device_jobs::Migration),
        ]
    }
}
