//! Connection manager.
//!
//! Owns the broker session lifecycle for one node: connect, resubscribe,
//! and reconnect with bounded backoff.
//!
//! ```text
//!              connect()                 CONNACK
//! DISCONNECTED ─────────▶ CONNECTING ─────────────────▶ CONNECTED
//!      ▲                      │                             │
//!      │  refused / timeout   │    transport error /        │
//!      └──────────────────────┴──── SUBACK refused/late ◀───┘
//!            (backoff grows, next attempt scheduled)
//! ```
//!
//! Loss is never fatal and there is no retry limit.  Every successful
//! handshake re-subscribes the full topic set for the node's role and
//! counts each acknowledgement; a refused subscription is handled as a
//! transport error so the whole session is retried.
//!
//! Transports that hear from the broker on another thread answer
//! [`Handshake::Pending`] and deliver the outcome later through
//! [`ConnectionManager::on_ack`].  The manager never waits: an
//! acknowledgement that does not arrive within the ack timeout fails the
//! session on the next [`ConnectionManager::poll`].

use log::{debug, info, warn};

use crate::app::ports::{Handshake, NodeIdentity, TransportPort};
use crate::config::BackoffPolicy;
use crate::error::TransportError;
use crate::events::TransportAck;
use crate::model::Millis;
use crate::protocol::Topic;

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Most topics any role subscribes to.
const MAX_REQUIRED_TOPICS: usize = 4;

/// Ack wait used until [`ConnectionManager::with_ack_timeout`] overrides it.
pub const DEFAULT_ACK_TIMEOUT_MS: Millis = 5_000;

// ───────────────────────────────────────────────────────────────
// Backoff
// ───────────────────────────────────────────────────────────────

/// Reconnect delay generator.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    /// Delay that the next failure will wait.
    current_ms: Millis,
    /// Consecutive failures since the last successful connect.
    failures: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current_ms: Self::floor(policy),
            failures: 0,
        }
    }

    /// Delay to apply after a failure.  Grows for the next call.
    pub fn next_delay(&mut self) -> Millis {
        self.failures = self.failures.saturating_add(1);
        let delay = self.current_ms;
        if let BackoffPolicy::Exponential { max_ms, .. } = self.policy {
            self.current_ms = self.current_ms.saturating_mul(2).min(max_ms);
        }
        delay
    }

    /// Back to the minimum delay.
    pub fn reset(&mut self) {
        self.current_ms = Self::floor(self.policy);
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn floor(policy: BackoffPolicy) -> Millis {
        match policy {
            BackoffPolicy::Exponential { min_ms, .. } => min_ms,
            BackoffPolicy::Fixed { delay_ms } => delay_ms,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Connection manager
// ───────────────────────────────────────────────────────────────

pub struct ConnectionManager {
    state: ConnectionState,
    identity: NodeIdentity,
    backoff: Backoff,
    /// Topic set this role must hold while connected.
    required: heapless::Vec<Topic, MAX_REQUIRED_TOPICS>,
    /// How many of `required` were acknowledged in the current session.
    subscribed: usize,
    /// Subscriptions sent but not yet acknowledged.
    pending_acks: usize,
    /// Set while a CONNACK or SUBACK is outstanding.
    ack_deadline: Option<Millis>,
    ack_timeout_ms: Millis,
    /// Earliest time the next connect attempt may run.
    retry_at: Millis,
    attempts: u32,
    sessions: u32,
}

impl ConnectionManager {
    /// Topics beyond [`MAX_REQUIRED_TOPICS`] or longer than a [`Topic`]
    /// are dropped with a warning; config validation prevents both.
    pub fn new(identity: NodeIdentity, topics: &[&str], policy: BackoffPolicy) -> Self {
        let mut required = heapless::Vec::new();
        for t in topics {
            match Topic::try_from(*t) {
                Ok(topic) if required.push(topic.clone()).is_ok() => {}
                _ => warn!("CONN: cannot track required topic '{}'", t),
            }
        }
        Self {
            state: ConnectionState::Disconnected,
            identity,
            backoff: Backoff::new(policy),
            required,
            subscribed: 0,
            pending_acks: 0,
            ack_deadline: None,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            retry_at: 0,
            attempts: 0,
            sessions: 0,
        }
    }

    pub fn with_ack_timeout(mut self, ack_timeout_ms: Millis) -> Self {
        self.ack_timeout_ms = ack_timeout_ms;
        self
    }

    /// Expire an overdue handshake, or attempt a connection when
    /// disconnected and the backoff has elapsed.
    ///
    /// Returns `None` when nothing happened.
    pub fn poll(
        &mut self,
        now: Millis,
        transport: &mut impl TransportPort,
    ) -> Option<Result<(), TransportError>> {
        if let Some(deadline) = self.ack_deadline {
            if now < deadline {
                return None;
            }
            warn!(
                "CONN: no acknowledgement within {}ms, dropping session",
                self.ack_timeout_ms
            );
            transport.disconnect();
            self.on_transport_error(now);
            return Some(Err(TransportError::Timeout));
        }
        if self.state != ConnectionState::Disconnected || now < self.retry_at {
            return None;
        }
        Some(self.connect(now, transport))
    }

    /// Start the handshake from DISCONNECTED.  A no-op when a session is
    /// already up or on its way.
    pub fn connect(
        &mut self,
        now: Millis,
        transport: &mut impl TransportPort,
    ) -> Result<(), TransportError> {
        if self.state != ConnectionState::Disconnected {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        self.attempts = self.attempts.saturating_add(1);
        info!(
            "CONN: connecting as '{}' (attempt {}, {} consecutive failures)",
            self.identity.client_id,
            self.attempts,
            self.backoff.failures()
        );

        match transport.connect(&self.identity) {
            Ok(Handshake::Complete) => self.on_connected(now, transport),
            Ok(Handshake::Pending) => {
                self.ack_deadline = Some(now.saturating_add(self.ack_timeout_ms));
                debug!("CONN: handshake sent, waiting for the broker");
                Ok(())
            }
            Err(e) => {
                warn!("CONN: handshake failed: {}", e);
                self.on_transport_error(now);
                Err(e)
            }
        }
    }

    /// Apply a handshake acknowledgement delivered through the event
    /// queue.  Acks that do not match the current state are ignored.
    pub fn on_ack(
        &mut self,
        ack: TransportAck,
        now: Millis,
        transport: &mut impl TransportPort,
    ) -> Result<(), TransportError> {
        match (ack, self.state) {
            (TransportAck::Connected, ConnectionState::Connecting) => {
                self.on_connected(now, transport)
            }
            (TransportAck::Refused, ConnectionState::Connecting) => {
                warn!("CONN: broker refused the session");
                transport.disconnect();
                self.on_transport_error(now);
                Err(TransportError::ConnectFailed)
            }
            (TransportAck::Subscribed(true), ConnectionState::Connected) if self.pending_acks > 0 => {
                self.pending_acks -= 1;
                self.subscribed += 1;
                if self.pending_acks == 0 {
                    self.ack_deadline = None;
                    self.log_restored();
                }
                Ok(())
            }
            (TransportAck::Subscribed(false), ConnectionState::Connected) if self.pending_acks > 0 => {
                warn!("CONN: subscription refused, dropping session");
                transport.disconnect();
                self.on_transport_error(now);
                Err(TransportError::SubscribeFailed)
            }
            (ack, state) => {
                debug!("CONN: ignoring {:?} while {:?}", ack, state);
                Ok(())
            }
        }
    }

    /// Any transport failure: drop to DISCONNECTED and schedule a retry.
    ///
    /// Reports arriving while already disconnected (for instance a late
    /// loss notice from the I/O thread) do not grow the backoff again.
    pub fn on_transport_error(&mut self, now: Millis) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.subscribed = 0;
        self.pending_acks = 0;
        self.ack_deadline = None;
        let delay = self.backoff.next_delay();
        self.retry_at = now.saturating_add(delay);
        warn!("CONN: disconnected, retry in {}ms", delay);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// True when connected and every required topic was acknowledged.
    pub fn is_fully_subscribed(&self) -> bool {
        self.is_connected() && self.subscribed == self.required.len()
    }

    /// True while a CONNACK or SUBACK is outstanding.
    pub fn awaiting_ack(&self) -> bool {
        self.ack_deadline.is_some()
    }

    pub fn retry_at(&self) -> Millis {
        self.retry_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.backoff.failures()
    }

    /// Total handshake attempts since start.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total successful sessions since start.
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    // ── Internal ──────────────────────────────────────────────

    /// Handshake succeeded: reset backoff and restore every subscription.
    fn on_connected(
        &mut self,
        now: Millis,
        transport: &mut impl TransportPort,
    ) -> Result<(), TransportError> {
        self.state = ConnectionState::Connected;
        self.backoff.reset();
        self.subscribed = 0;
        self.pending_acks = 0;
        self.ack_deadline = None;
        self.sessions = self.sessions.saturating_add(1);

        let mut refused = false;
        for topic in &self.required {
            match transport.subscribe(topic) {
                Ok(Handshake::Complete) => self.subscribed += 1,
                Ok(Handshake::Pending) => self.pending_acks += 1,
                Err(e) => {
                    warn!("CONN: subscribe '{}' failed: {}, dropping session", topic, e);
                    refused = true;
                    break;
                }
            }
        }
        if refused {
            transport.disconnect();
            self.on_transport_error(now);
            return Err(TransportError::SubscribeFailed);
        }

        if self.pending_acks > 0 {
            self.ack_deadline = Some(now.saturating_add(self.ack_timeout_ms));
            debug!("CONN: connected, {} subscriptions awaiting ack", self.pending_acks);
        } else {
            self.log_restored();
        }
        Ok(())
    }

    fn log_restored(&self) {
        info!(
            "CONN: connected, {} subscriptions restored (session {})",
            self.subscribed, self.sessions
        );
    }
}
