//! Application services

pub mod booking;
pub mod booking_expiry;
pub mod conflict_resolver;
pub mod light_dispatcher;
pub mod light_scheduler;
pub mod pricing;
pub mod slot_locks;

pub use booking::{BookingService, BookingSettings};
pub use booking_expiry::start_booking_expiry_task;
pub use conflict_resolver::SlotConflictResolver;
pub use light_dispatcher::{DispatchStats, DispatcherConfig, LightDispatcher};
pub use light_scheduler::{LightScheduler, LightWindow};
pub use pricing::{DeviceKeyInfo, PricingService};
pub use slot_locks::SlotLocks;
