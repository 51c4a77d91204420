pub mod ports;
pub mod services;

// Re-export key types for convenience
pub use ports::DevicePublisher;
pub use services::{
    start_booking_expiry_task, BookingService, BookingSettings, DispatcherConfig, LightDispatcher,
    LightScheduler, PricingService, SlotLocks,
};
