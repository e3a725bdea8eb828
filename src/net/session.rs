/// Telemetry-session lifecycle: open with retry, reconnect on notification
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use crate::models::TelemetryReport;
use crate::net::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport operation timed out")]
    Timeout,
    #[error("transport request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not open")]
    NotOpen,
    #[error("failed to open session: {0}")]
    Open(#[source] TransportError),
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish report: {0}")]
    Publish(#[source] TransportError),
}

/// Connectivity change reported by the transport's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Faulted,
}

/// Telemetry transport capability.
///
/// Implementations deliver their connectivity changes through the
/// `TransportStatus` channel handed out at construction; the session
/// manager's reconnect task consumes it.
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    async fn open(&self) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
    async fn publish(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Owns the session lifecycle above the network link.
///
/// Cheap to clone; all clones share the transport and the session state.
pub struct SessionManager<T> {
    transport: Arc<T>,
    policy: RetryPolicy,
    state: Arc<watch::Sender<SessionState>>,
}

impl<T> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        SessionManager {
            transport: self.transport.clone(),
            policy: self.policy,
            state: self.state.clone(),
        }
    }
}

impl<T: TelemetryTransport> SessionManager<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(SessionState::Closed);
        SessionManager {
            transport: Arc::new(transport),
            policy,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    fn set_state(&self, state: SessionState) {
        // send_replace updates the value even with no subscribers.
        self.state.send_replace(state);
    }

    /// Opens the session, sleeping the policy backoff between failures.
    ///
    /// Like the link manager, the unbounded production policy makes this
    /// return only on success; a failed attempt closes whatever the
    /// transport partially opened before retrying.
    pub async fn open(&self) -> Result<(), SessionError> {
        let mut attempts = 0u32;

        loop {
            self.set_state(SessionState::Opening);

            match self.transport.open().await {
                Ok(()) => {
                    self.set_state(SessionState::Open);
                    info!("Telemetry session is open");
                    return Ok(());
                }
                Err(e) => {
                    self.set_state(SessionState::Faulted);
                    if let Err(close_error) = self.transport.close().await {
                        debug!("Close after failed open: {}", close_error);
                    }

                    attempts += 1;
                    warn!("Session open attempt {} failed: {}", attempts, e);

                    if self.policy.exhausted(attempts) {
                        return Err(SessionError::Open(e));
                    }

                    sleep(self.policy.backoff).await;
                }
            }
        }
    }

    /// Serializes and forwards one report.
    ///
    /// A transport failure is surfaced, not retried: the next periodic
    /// cycle publishes fresh data anyway.
    pub async fn publish(&self, report: &TelemetryReport) -> Result<(), SessionError> {
        if self.state() != SessionState::Open {
            return Err(SessionError::NotOpen);
        }

        let payload = serde_json::to_vec(report)?;
        self.transport
            .publish(&payload)
            .await
            .map_err(SessionError::Publish)
    }

    /// Dedicated reconnect task: consumes status notifications until the
    /// transport drops its sender.
    ///
    /// Each `Disconnected` notification triggers exactly one reopen. Running
    /// this on its own task keeps the open-with-retry loop off the
    /// transport's event-loop thread.
    pub async fn run_reconnect(&self, mut status: mpsc::UnboundedReceiver<TransportStatus>) {
        while let Some(notification) = status.recv().await {
            if notification != TransportStatus::Disconnected {
                continue;
            }

            warn!("Telemetry session lost, reconnecting");
            self.set_state(SessionState::Closed);

            if let Err(e) = self.open().await {
                // Only reachable with a bounded policy.
                warn!("Reconnect abandoned: {}", e);
            }
        }

        debug!("Transport status channel closed, reconnect task stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingTransport {
        open_calls: AtomicU32,
        close_calls: AtomicU32,
        open_failures_left: AtomicU32,
        publish_fails: AtomicBool,
        published: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl TelemetryTransport for RecordingTransport {
        async fn open(&self) -> Result<(), TransportError> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.open_failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.open_failures_left.store(left - 1, Ordering::SeqCst);
                return Err(TransportError::Request("broker refused".into()));
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
            if self.publish_fails.load(Ordering::SeqCst) {
                return Err(TransportError::Request("connection reset".into()));
            }
            self.published.lock().await.push(payload.to_vec());
            Ok(())
        }
    }

    fn sample_report() -> TelemetryReport {
        TelemetryReport {
            temperature: 20.0,
            humidity: 50.0,
            pressure: 1000.0,
            pm10: 4.0,
            pm25: 2.0,
        }
    }

    #[tokio::test]
    async fn publish_before_open_is_rejected() {
        let session = SessionManager::new(RecordingTransport::default(), RetryPolicy::default());

        let err = session.publish(&sample_report()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotOpen));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_retries_with_backoff_and_closes_partial_resources() {
        let transport = RecordingTransport {
            open_failures_left: AtomicU32::new(2),
            ..Default::default()
        };
        let backoff = Duration::from_secs(10);
        let session = SessionManager::new(transport, RetryPolicy::unbounded(backoff));

        let started = Instant::now();
        session.open().await.unwrap();

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(started.elapsed(), backoff * 2);
        assert_eq!(
            session.transport.open_calls.load(Ordering::SeqCst),
            3,
            "two failures, then success"
        );
        assert_eq!(
            session.transport.close_calls.load(Ordering::SeqCst),
            2,
            "each failed open closes the partial resource"
        );
    }

    #[tokio::test]
    async fn bounded_policy_surfaces_the_open_error() {
        let transport = RecordingTransport {
            open_failures_left: AtomicU32::new(u32::MAX),
            ..Default::default()
        };
        let session =
            SessionManager::new(transport, RetryPolicy::bounded(Duration::from_millis(1), 2));

        let err = session.open().await.unwrap_err();
        assert!(matches!(err, SessionError::Open(_)));
        assert_eq!(session.state(), SessionState::Faulted);
    }

    #[tokio::test]
    async fn publish_forwards_the_serialized_report() {
        let session = SessionManager::new(RecordingTransport::default(), RetryPolicy::default());
        session.open().await.unwrap();

        session.publish(&sample_report()).await.unwrap();

        let published = session.transport.published.lock().await;
        let payload: serde_json::Value = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(payload["pm25"], 2.0);
        assert_eq!(payload["temperature"], 20.0);
    }

    #[tokio::test]
    async fn publish_failure_is_surfaced_without_retry() {
        let transport = RecordingTransport {
            publish_fails: AtomicBool::new(true),
            ..Default::default()
        };
        let session = SessionManager::new(transport, RetryPolicy::default());
        session.open().await.unwrap();

        let err = session.publish(&sample_report()).await.unwrap_err();
        assert!(matches!(err, SessionError::Publish(_)));
        // The session stays open; the next cycle simply tries again.
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.transport.open_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reopens_exactly_once_per_disconnect_notification() {
        let session = SessionManager::new(RecordingTransport::default(), RetryPolicy::default());
        session.open().await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let reconnect = {
            let session = session.clone();
            tokio::spawn(async move { session.run_reconnect(rx).await })
        };

        tx.send(TransportStatus::Disconnected).unwrap();
        tx.send(TransportStatus::Connected).unwrap();
        tx.send(TransportStatus::Disconnected).unwrap();
        drop(tx);
        reconnect.await.unwrap();

        // Initial open plus one reopen per Disconnected notification.
        assert_eq!(session.transport.open_calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.state(), SessionState::Open);
        session.publish(&sample_report()).await.unwrap();
    }
}
