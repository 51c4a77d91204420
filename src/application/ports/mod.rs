//! Application ports (hexagonal architecture boundaries)
//!
//! Inbound contracts are the repository traits in `domain`. Outbound ports
//! that leave the process live here.

pub mod outbound;

pub use outbound::DevicePublisher;
