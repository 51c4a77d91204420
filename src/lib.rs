//! # Court booking engine
//!
//! Booking core for a multi-court sports venue: slot conflict detection,
//! transactional booking creation, per-court price grids, and scheduled
//! court-light control over MQTT.
//!
//! ## Architecture
//!
//! - **domain**: Aggregates (court, pricing, booking, device jobs), pure
//!   rules and repository traits
//! - **application**: Services (booking, pricing, light scheduling and
//!   dispatch) and outbound ports
//! - **infrastructure**: SeaORM persistence, in-memory storage, MQTT
//! - **server**: Runtime wiring and graceful shutdown
//! - **support**: Errors, clock, retry policy, shutdown signal

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};

pub use support::errors::{AppError, DomainError, DomainResult};
