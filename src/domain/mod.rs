pub mod booking;
pub mod court;
pub mod device;
pub mod pricing;
pub mod repositories;

// Re-export commonly used types
pub use booking::{Booking, BookingItem, BookingRequest, BookingStatus, SlotTime};
pub use court::{Court, SubCourt};
pub use device::{JobKey, LightEventKind, LightJob};
pub use pricing::PriceGridEntry;
pub use repositories::{DomainResult, RepositoryProvider};

// Re-export DomainError from support for convenience
pub use crate::support::errors::{ConflictReason, DomainError};
