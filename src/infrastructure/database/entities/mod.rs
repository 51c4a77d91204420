//! Database entities module

pub mod booking;
pub mod booking_item;
pub mod court;
pub mod court_price;
pub mod device_job;
pub mod sub_court;

pub use booking::Entity as Booking;
pub use booking_item::Entity as BookingItem;
pub use court::Entity as Court;
pub use court_price::Entity as CourtPrice;
pub use device_job::Entity as DeviceJob;
pub use sub_court::Entity as SubCourt;
