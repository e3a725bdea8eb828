/// MQTT implementation of the telemetry transport
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};

use crate::config::AgentConfig;
use crate::net::session::{TelemetryTransport, TransportError, TransportStatus};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CHANNEL_CAPACITY: usize = 16;

// Pause after a connection error so a dead socket is not polled in a
// tight loop.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Telemetry transport over MQTT.
///
/// A background task drives the client event loop and translates broker
/// acknowledgements and connection errors into `TransportStatus` changes:
/// one copy feeds `open()`'s wait internally, the other is handed to the
/// session manager's reconnect task at construction.
pub struct MqttTransport {
    client: AsyncClient,
    status: watch::Receiver<TransportStatus>,
    topic: String,
    open_timeout: Duration,
}

impl MqttTransport {
    pub fn new(config: &AgentConfig) -> (Self, mpsc::UnboundedReceiver<TransportStatus>) {
        let mut options = MqttOptions::new(
            config.device_id.clone(),
            config.mqtt_host.clone(),
            config.mqtt_port,
        );
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(TransportStatus::Disconnected);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        debug!("MQTT broker acknowledged the connection");
                        if *status_tx.borrow() != TransportStatus::Connected {
                            let _ = status_tx.send(TransportStatus::Connected);
                            let _ = notify_tx.send(TransportStatus::Connected);
                        }
                    }
                    Ok(event) => debug!("MQTT event: {:?}", event),
                    Err(e) => {
                        warn!("MQTT connection error: {}", e);
                        if *status_tx.borrow() != TransportStatus::Disconnected {
                            let _ = status_tx.send(TransportStatus::Disconnected);
                            let _ = notify_tx.send(TransportStatus::Disconnected);
                        }
                        sleep(POLL_ERROR_PAUSE).await;
                    }
                }
            }
        });

        let transport = MqttTransport {
            client,
            status: status_rx,
            topic: config.telemetry_topic.clone(),
            open_timeout: config.connect_timeout,
        };

        (transport, notify_rx)
    }
}

#[async_trait]
impl TelemetryTransport for MqttTransport {
    /// Waits until the event loop reports a broker acknowledgement; the
    /// client itself dials in the background as soon as it is polled.
    async fn open(&self) -> Result<(), TransportError> {
        let mut status = self.status.clone();

        let connected = async move {
            while *status.borrow_and_update() != TransportStatus::Connected {
                if status.changed().await.is_err() {
                    return Err(TransportError::Request(
                        "transport event loop stopped".into(),
                    ));
                }
            }
            Ok(())
        };

        match timeout(self.open_timeout, connected).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.client
            .publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}
