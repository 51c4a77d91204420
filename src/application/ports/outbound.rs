//! Outbound ports: the device-facing wire
//!
//! [`DevicePublisher`] decouples the light dispatcher from the concrete
//! transport. The production implementation is
//! [`MqttPublisher`](crate::infrastructure::mqtt::MqttPublisher).

use async_trait::async_trait;

use crate::domain::device::LightPayload;
use crate::support::errors::InfraError;

/// Publishes light commands to court controllers.
#[async_trait]
pub trait DevicePublisher: Send + Sync {
    /// Publish one command with at-least-once delivery. An `Err` means the
    /// message was not handed to the broker and the caller should retry.
    async fn publish(&self, topic: &str, payload: &LightPayload) -> Result<(), InfraError>;
}
