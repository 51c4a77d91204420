//! Court light control
//!
//! Scheduled light events, their deterministic identity, the controller
//! payload, and the delayed-dispatch queue interface.

pub mod model;
pub mod queue;

pub use model::{
    delay_until, extract_zone, light_topic, JobKey, JobState, LightCommand, LightEventKind,
    LightJob, LightPayload,
};
pub use queue::{EnqueueOutcome, LightJobQueue};
