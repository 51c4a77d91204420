//! Non-network publishers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::application::ports::DevicePublisher;
use crate::domain::device::LightPayload;
use crate::support::errors::InfraError;

/// Logs every command instead of sending it. Used when MQTT is disabled.
#[derive(Debug, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl DevicePublisher for LoggingPublisher {
    async fn publish(&self, topic: &str, payload: &LightPayload) -> Result<(), InfraError> {
        let body = serde_json::to_string(payload)?;
        info!(topic, %body, "💡 Light command (MQTT disabled)");
        Ok(())
    }
}

/// Keeps published messages in memory and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, LightPayload)>>,
    failures_left: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, LightPayload)> {
        self.published
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl DevicePublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &LightPayload) -> Result<(), InfraError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(InfraError::Mqtt("injected failure".to_string()));
        }
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((topic.to_string(), payload.clone()));
        Ok(())
    }
}
