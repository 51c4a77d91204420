//! Pricing aggregate

pub mod model;
pub mod repository;

pub use model::{
    day_of_week, generate_grid, quote, validate_day_of_week, PriceGridEntry, SLOTS_PER_DAY,
    SLOT_MINUTES,
};
pub use repository::PriceRepository;
