//! MQTT channel to court light controllers
//!
//! [`MqttPublisher`] owns one `rumqttc` client and a background task that
//! drives its event loop. The event loop reconnects on its own after a
//! failure; publishes are refused while the broker is unreachable so the
//! dispatcher can schedule a retry.
//!
//! A publish counts as delivered once rumqttc has accepted it into its
//! outgoing queue, not when the broker's PUBACK arrives. The dispatcher
//! deletes the job row at that point, so a crash between the hand-off and
//! the flush to the broker loses that one command. QoS 1 still covers
//! broker-side redelivery once the packet is on the wire.

mod recording;

pub use recording::{LoggingPublisher, RecordingPublisher};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::DevicePublisher;
use crate::config::MqttSection;
use crate::domain::device::LightPayload;
use crate::support::errors::InfraError;
use crate::support::shutdown::ShutdownSignal;

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 64;

pub struct MqttPublisher {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    stop: ShutdownSignal,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop. Returns immediately; the
    /// connection is established in the background.
    pub fn connect(config: &MqttSection) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let stop = ShutdownSignal::new();
        let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);

        let task = {
            let connected = connected.clone();
            let stop = stop.clone();
            let broker = format!("{}:{}", config.host, config.port);
            tokio::spawn(async move {
                info!(%broker, "💡 MQTT event loop started");
                loop {
                    tokio::select! {
                        event = event_loop.poll() => match event {
                            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                                connected.store(true, Ordering::SeqCst);
                                info!(%broker, "💡 Connected to MQTT broker");
                            }
                            Ok(Event::Incoming(Packet::Disconnect)) => {
                                connected.store(false, Ordering::SeqCst);
                                warn!(%broker, "MQTT broker closed the session");
                            }
                            Ok(event) => debug!(?event, "MQTT event"),
                            Err(e) => {
                                if connected.swap(false, Ordering::SeqCst) {
                                    warn!(%broker, error = %e, "MQTT connection lost");
                                } else {
                                    debug!(%broker, error = %e, "MQTT connect attempt failed");
                                }
                                tokio::select! {
                                    _ = tokio::time::sleep(reconnect_delay) => {}
                                    _ = stop.wait() => break,
                                }
                            }
                        },
                        _ = stop.wait() => break,
                    }
                }
                connected.store(false, Ordering::SeqCst);
                info!(%broker, "💡 MQTT event loop stopped");
            })
        };

        Self {
            client,
            connected,
            stop,
            event_loop: Mutex::new(Some(task)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Disconnect from the broker and wait for the event loop task to end.
    pub async fn shutdown(&self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not delivered");
        }
        self.stop.trigger();
        if let Some(task) = self.event_loop.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "MQTT event loop task panicked");
            }
        }
    }
}

#[async_trait]
impl DevicePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &LightPayload) -> Result<(), InfraError> {
        if !self.is_connected() {
            return Err(InfraError::Mqtt("not connected to broker".to_string()));
        }
        let body = serde_json::to_vec(payload)?;
        // Returns once queued locally; PUBACK is handled by the event loop
        self.client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await?;
        debug!(topic, cmd = ?payload.cmd, booking_id = %payload.booking_id, "Light command published");
        Ok(())
    }
}
