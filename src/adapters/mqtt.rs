//! MQTT transport adapter (rumqttc, sync client).
//!
//! Each session gets a fresh `rumqttc::Client` plus an I/O thread that
//! drives the connection iterator.  Nothing on the core side waits for
//! the network: requests are queued on the client and every answer comes
//! back through the node's [`EventQueue`]:
//!
//! ```text
//!  core loop                         mqtt-io thread
//!  ─────────                         ──────────────
//!  connect()  ── Client::new ──────▶ connection.iter()
//!                                    ConnAck ──▶ EventQueue (Ack)
//!  subscribe() ─ try_subscribe ────▶
//!                                    SubAck  ──▶ EventQueue (Ack)
//!  publish()  ── try_publish ──────▶
//!                                    Publish ──▶ EventQueue (Inbound)
//!                                    error   ──▶ EventQueue (TransportLost), exit
//! ```
//!
//! rumqttc would reconnect by itself if the iterator were polled after an
//! error; the I/O thread exits instead, so the connection manager alone
//! decides when to retry.  It also times out missing acknowledgements.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{
    Client, ConnectReturnCode, Connection, Event as MqttEvent, MqttOptions, Packet, QoS,
    SubscribeReasonCode,
};

use crate::app::ports::{Handshake, NodeIdentity, TransportPort};
use crate::config::BrokerConfig;
use crate::error::TransportError;
use crate::events::{Event, EventQueue, TransportAck};

/// Requests buffered between the core loop and the I/O thread.
const REQUEST_CAP: usize = 16;

struct Session {
    client: Client,
    /// Cleared before a deliberate disconnect so the I/O thread exits
    /// without reporting anything further.
    live: Arc<AtomicBool>,
}

pub struct MqttTransport {
    broker: BrokerConfig,
    queue: Arc<EventQueue>,
    session: Option<Session>,
}

impl MqttTransport {
    pub fn new(broker: BrokerConfig, queue: Arc<EventQueue>) -> Self {
        Self {
            broker,
            queue,
            session: None,
        }
    }

    fn options(&self, identity: &NodeIdentity) -> MqttOptions {
        let mut options =
            MqttOptions::new(&identity.client_id, &self.broker.host, self.broker.port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.broker.keep_alive_secs)));
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&identity.username, &identity.password) {
            options.set_credentials(username, password);
        }
        options
    }

    fn session(&self) -> Result<&Session, TransportError> {
        self.session.as_ref().ok_or(TransportError::NotConnected)
    }
}

impl TransportPort for MqttTransport {
    fn connect(&mut self, identity: &NodeIdentity) -> Result<Handshake, TransportError> {
        self.disconnect();
        self.queue.clear_lost();

        info!(
            "MQTT: connecting to {}:{} as '{}'",
            self.broker.host, self.broker.port, identity.client_id
        );
        let (client, connection) = Client::new(self.options(identity), REQUEST_CAP);
        let live = Arc::new(AtomicBool::new(true));

        let queue = self.queue.clone();
        let thread_live = live.clone();
        std::thread::Builder::new()
            .name("mqtt-io".into())
            .spawn(move || io_loop(connection, &queue, &thread_live))
            .map_err(|e| {
                warn!("MQTT: cannot spawn I/O thread: {}", e);
                TransportError::ConnectFailed
            })?;

        self.session = Some(Session { client, live });
        Ok(Handshake::Pending)
    }

    fn subscribe(&mut self, topic: &str) -> Result<Handshake, TransportError> {
        self.session()?
            .client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| {
                warn!("MQTT: subscribe '{}' not queued: {}", topic, e);
                TransportError::SubscribeFailed
            })?;
        debug!("MQTT: subscribe '{}' sent", topic);
        Ok(Handshake::Pending)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        self.session()?
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .map_err(|e| {
                warn!("MQTT: publish to '{}' failed: {}", topic, e);
                TransportError::PublishFailed
            })
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.live.store(false, Ordering::Release);
            let _ = session.client.try_disconnect();
            info!("MQTT: session closed");
        }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Map a broker packet to the event the core needs, if any.
fn packet_event(packet: Packet) -> Option<Event> {
    match packet {
        Packet::ConnAck(ack) => Some(Event::Ack(if ack.code == ConnectReturnCode::Success {
            TransportAck::Connected
        } else {
            TransportAck::Refused
        })),
        Packet::SubAck(ack) => {
            let ok = ack
                .return_codes
                .iter()
                .all(|c| matches!(c, SubscribeReasonCode::Success(_)));
            Some(Event::Ack(TransportAck::Subscribed(ok)))
        }
        Packet::Publish(p) => {
            let event = Event::inbound(&p.topic, &p.payload);
            if event.is_none() {
                warn!("MQTT: oversized message on '{}' dropped", p.topic);
            }
            event
        }
        _ => None,
    }
}

/// Body of the I/O thread.  Runs until the first connection error or
/// until the session is closed from the core side.
fn io_loop(mut connection: Connection, queue: &EventQueue, live: &AtomicBool) {
    for notification in connection.iter() {
        match notification {
            Ok(MqttEvent::Incoming(packet)) => {
                if !live.load(Ordering::Acquire) {
                    break;
                }
                if let Some(event) = packet_event(packet) {
                    queue.post(event);
                }
            }
            Ok(_) => {}
            Err(e) => {
                if live.swap(false, Ordering::AcqRel) {
                    warn!("MQTT: connection lost: {}", e);
                    queue.post(Event::TransportLost);
                } else {
                    debug!("MQTT: I/O thread done: {}", e);
                }
                break;
            }
        }
    }
}
