//! Infrastructure layer - external concerns

pub mod database;
pub mod mqtt;
pub mod storage;

pub use database::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};
pub use mqtt::{LoggingPublisher, MqttPublisher};
pub use storage::InMemoryStorage;
