//! Booking aggregate
//!
//! Contains the Booking entity, slot conflict rules, and repository interface.

pub mod conflict;
pub mod model;
pub mod repository;

pub use model::{
    overlaps, BookedSlot, Booking, BookingItem, BookingRequest, BookingRequestItem,
    BookingRevision, BookingStatus, NewBooking, RequestedSlot, SlotTime,
};
pub use repository::BookingRepository;
