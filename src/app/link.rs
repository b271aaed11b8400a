//! Broker link shared by both node services.
//!
//! Bundles the transport adapter, its [`ConnectionManager`] and the topic
//! table, and keeps the publish rules in one place:
//! - nothing is published while disconnected (the message is dropped and
//!   counted, delivery is at-most-once anyway)
//! - a failed publish is a transport error and drops the session

use log::{debug, error, warn};

use crate::config::NodeConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::diagnostics::{Counter, NodeDiagnostics};
use crate::events::TransportAck;
use crate::model::Millis;
use crate::protocol::{TopicKind, Topics};

use super::events::AppEvent;
use super::ports::{EventSink, NodeIdentity, TransportPort};

pub struct NodeLink<T: TransportPort> {
    transport: T,
    conn: ConnectionManager,
    topics: Topics,
}

impl<T: TransportPort> NodeLink<T> {
    /// `subscriptions` is the topic set the role must hold while connected.
    pub fn new(config: &NodeConfig, transport: T, subscriptions: &[TopicKind]) -> Self {
        let topics = Topics::new(&config.topic_prefix);
        let required: Vec<&str> = subscriptions.iter().map(|k| topics.get(*k)).collect();
        let conn = ConnectionManager::new(
            NodeIdentity::from_config(config),
            &required,
            config.backoff,
        )
        .with_ack_timeout(config.broker.ack_timeout_ms);
        Self {
            transport,
            conn,
            topics,
        }
    }

    /// Let the connection manager attempt a (re)connect if one is due, or
    /// expire a handshake that took too long.
    ///
    /// Returns `true` when a new session was just established.
    pub fn poll(
        &mut self,
        now: Millis,
        diagnostics: &mut NodeDiagnostics,
        sink: &mut impl EventSink,
    ) -> bool {
        let before = self.conn.state();
        if self.conn.poll(now, &mut self.transport).is_none() {
            return false;
        }
        if before == ConnectionState::Disconnected {
            diagnostics.record(Counter::ReconnectAttempt);
        }
        self.settle(before, diagnostics, sink)
    }

    /// Feed a handshake acknowledgement to the connection manager.
    ///
    /// Returns `true` when it completed a new session.
    pub fn on_ack(
        &mut self,
        ack: TransportAck,
        now: Millis,
        diagnostics: &mut NodeDiagnostics,
        sink: &mut impl EventSink,
    ) -> bool {
        let before = self.conn.state();
        if let Err(e) = self.conn.on_ack(ack, now, &mut self.transport) {
            warn!("LINK: handshake failed: {}", e);
        }
        self.settle(before, diagnostics, sink)
    }

    /// Publish if connected.  Returns `true` when the transport accepted it.
    pub fn publish(
        &mut self,
        kind: TopicKind,
        payload: &[u8],
        retain: bool,
        now: Millis,
        diagnostics: &mut NodeDiagnostics,
        sink: &mut impl EventSink,
    ) -> bool {
        let topic = self.topics.get(kind);
        if !self.conn.is_connected() {
            diagnostics.record(Counter::DroppedPublish);
            debug!("LINK: offline, dropped publish to '{}'", topic);
            return false;
        }
        match self.transport.publish(topic, payload, retain) {
            Ok(()) => true,
            Err(e) => {
                diagnostics.record(Counter::PublishFailure);
                error!("LINK: publish to '{}' failed: {}", topic, e);
                self.lost(now, sink);
                false
            }
        }
    }

    /// The transport reported or hit a failure.
    pub fn lost(&mut self, now: Millis, sink: &mut impl EventSink) {
        let before = self.conn.state();
        self.conn.on_transport_error(now);
        if before != ConnectionState::Disconnected {
            warn!("LINK: session lost");
            self.transport.disconnect();
        }
        Self::report(before, self.conn.state(), sink);
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.conn
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Count and report a state change; `true` when it opened a session.
    fn settle(
        &self,
        before: ConnectionState,
        diagnostics: &mut NodeDiagnostics,
        sink: &mut impl EventSink,
    ) -> bool {
        let after = self.conn.state();
        let opened = before != ConnectionState::Connected && after == ConnectionState::Connected;
        if opened {
            diagnostics.record(Counter::Connect);
        }
        Self::report(before, after, sink);
        opened
    }

    fn report(from: ConnectionState, to: ConnectionState, sink: &mut impl EventSink) {
        if from != to {
            sink.emit(&AppEvent::ConnectionChanged { from, to });
        }
    }
}
