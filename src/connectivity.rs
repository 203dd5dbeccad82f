//! Network + telemetry session management.
//!
//! [`ConnectivityManager`] wraps the WiFi session ([`NetworkPort`]) and
//! the MQTT session ([`TelemetryTransport`]) and brings both up again when
//! either drops.
//!
//! ```text
//!   Disconnected ──▶ Connecting ──ok──▶ Connected
//!        ▲               │ err               │ link lost
//!        │               ▼                   │
//!        └──────── WaitingRetry ◀────────────┘ (via Disconnected)
//! ```
//!
//! The retry wait is a fixed interval with no attempt limit and no backoff
//! growth.  [`reconnect`](ConnectivityManager::reconnect) sleeps through it;
//! [`poll`](ConnectivityManager::poll) counts it down from the loop step.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{NetworkPort, TelemetryTransport};
use crate::error::CommsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    WaitingRetry { remaining_ms: u32 },
}

pub struct ConnectivityManager<N, T> {
    network: N,
    transport: T,
    state: LinkState,
    retry_interval_ms: u32,
    failed_attempts: u32,
    last_error: Option<CommsError>,
}

impl<N: NetworkPort, T: TelemetryTransport> ConnectivityManager<N, T> {
    pub fn new(network: N, transport: T, retry_interval_ms: u32) -> Self {
        Self {
            network,
            transport,
            state: LinkState::Disconnected,
            retry_interval_ms,
            failed_attempts: 0,
            last_error: None,
        }
    }

    /// Both sessions are up.
    pub fn connected(&self) -> bool {
        self.network.is_connected() && self.transport.is_connected()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Failed attempts since the link was last up.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Error of the most recent failed attempt, cleared on success.
    pub fn last_error(&self) -> Option<CommsError> {
        self.last_error
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// One connect attempt: network first, then the transport session.
    pub fn attempt(&mut self) -> Result<(), CommsError> {
        self.state = LinkState::Connecting;
        let result = self.connect_sessions();
        match result {
            Ok(()) => {
                if self.failed_attempts > 0 {
                    info!("link: up after {} failed attempt(s)", self.failed_attempts);
                } else {
                    info!("link: up");
                }
                self.state = LinkState::Connected;
                self.failed_attempts = 0;
                self.last_error = None;
            }
            Err(e) => {
                self.failed_attempts = self.failed_attempts.saturating_add(1);
                self.last_error = Some(e);
                warn!(
                    "link: attempt {} failed ({}), retrying in {} ms",
                    self.failed_attempts, e, self.retry_interval_ms
                );
                self.state = LinkState::WaitingRetry {
                    remaining_ms: self.retry_interval_ms,
                };
            }
        }
        result
    }

    fn connect_sessions(&mut self) -> Result<(), CommsError> {
        if !self.network.is_connected() {
            self.network.connect()?;
        }
        if !self.transport.is_connected() {
            self.transport.connect()?;
        }
        Ok(())
    }

    /// Block until both sessions are up, sleeping the fixed interval between
    /// attempts.  Returns the number of attempts made (0 if already up).
    pub fn reconnect<D: DelayNs>(&mut self, delay: &mut D) -> u32 {
        let mut attempts = 0u32;
        while !self.connected() {
            attempts = attempts.saturating_add(1);
            if self.attempt().is_ok() {
                break;
            }
            delay.delay_ms(self.retry_interval_ms);
        }
        self.state = LinkState::Connected;
        attempts
    }

    /// Advance the cooperative state machine by `delta_ms`.
    pub fn poll(&mut self, delta_ms: u32) -> LinkState {
        match self.state {
            LinkState::Connected => {
                if !self.connected() {
                    warn!("link: lost");
                    self.state = LinkState::Disconnected;
                }
            }
            LinkState::Disconnected | LinkState::Connecting => {
                let _ = self.attempt();
            }
            LinkState::WaitingRetry { remaining_ms } => {
                if delta_ms >= remaining_ms {
                    let _ = self.attempt();
                } else {
                    self.state = LinkState::WaitingRetry {
                        remaining_ms: remaining_ms - delta_ms,
                    };
                }
            }
        }
        self.state
    }

    /// Publish through the transport.  Does not reconnect.
    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        if !self.connected() {
            return Err(CommsError::NotConnected);
        }
        self.transport.publish(topic, payload, retain)
    }
}
