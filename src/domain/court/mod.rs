//! Court aggregate
//!
//! Parent courts, their sub-courts and the device routing key.

pub mod model;
pub mod repository;

pub use model::{generate_device_key, routing_key, Court, NewCourt, SubCourt, DEFAULT_DEVICE_KEY};
pub use repository::CourtRepository;
