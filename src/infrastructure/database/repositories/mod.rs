//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod booking_repository;
pub mod court_repository;
pub mod light_job_queue;
pub mod price_repository;
pub mod repository_provider;

pub use repository_provider::SeaOrmRepositoryProvider;
