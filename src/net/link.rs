/// Network-link lifecycle: connect with bounded attempts, retry forever
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use crate::net::retry::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("connect attempt timed out")]
    Timeout,
    #[error("connect attempt failed with status code {0}")]
    Status(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// One bounded connect attempt against the underlying network.
///
/// Credentials or probe targets are construction parameters of the
/// implementation; the manager only drives attempts.
#[async_trait]
pub trait NetworkLink: Send + Sync {
    async fn connect(&self, attempt_timeout: Duration) -> Result<(), LinkError>;
}

/// Owns the link lifecycle for the rest of the agent.
///
/// Reconnection after a later drop is not observed here: the telemetry
/// transport carries its own reconnect path, and the agent has no other
/// network consumers.
pub struct LinkManager<L> {
    link: L,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    state: LinkState,
}

impl<L: NetworkLink> LinkManager<L> {
    pub fn new(link: L, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        LinkManager {
            link,
            policy,
            attempt_timeout,
            state: LinkState::Disconnected,
        }
    }

    /// Connects, sleeping the policy backoff between failed attempts.
    ///
    /// With the unbounded production policy this only ever returns `Ok`;
    /// the error path exists for bounded test policies.
    pub async fn connect(&mut self) -> Result<(), LinkError> {
        let mut attempts = 0u32;

        loop {
            self.state = LinkState::Connecting;

            match self.link.connect(self.attempt_timeout).await {
                Ok(()) => {
                    self.state = LinkState::Connected;
                    info!("Network link is up");
                    return Ok(());
                }
                Err(e) => {
                    self.state = LinkState::Disconnected;
                    attempts += 1;
                    warn!("Link connect attempt {} failed: {}", attempts, e);

                    if self.policy.exhausted(attempts) {
                        return Err(e);
                    }

                    sleep(self.policy.backoff).await;
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }
}

/// Link probe for hosts where the OS owns interface bring-up: the link
/// counts as up once a TCP connection to the telemetry broker succeeds
/// within the attempt timeout.
pub struct TcpProbeLink {
    addr: String,
}

impl TcpProbeLink {
    pub fn new(addr: impl Into<String>) -> Self {
        TcpProbeLink { addr: addr.into() }
    }
}

#[async_trait]
impl NetworkLink for TcpProbeLink {
    async fn connect(&self, attempt_timeout: Duration) -> Result<(), LinkError> {
        match timeout(attempt_timeout, TcpStream::connect(&self.addr)).await {
            Err(_) => Err(LinkError::Timeout),
            Ok(Err(e)) => Err(LinkError::Status(e.raw_os_error().unwrap_or(-1))),
            Ok(Ok(_)) => Ok(()),
        }
    }
}
