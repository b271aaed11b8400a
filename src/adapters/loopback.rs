//! In-process broker.
//!
//! [`LoopbackBroker`] routes publishes between [`LoopbackTransport`]s in the
//! same process with the delivery rules the nodes rely on:
//! - exact-match topic subscriptions
//! - retained messages replayed to a new subscriber on subscribe
//! - a second connect with the same client id evicts the first session
//! - at-most-once: a full client queue drops the message
//!
//! Fault injection (refused connects, refused subscriptions, forced client
//! drops) lets tests and the simulator exercise the reconnect path.  The
//! broker keeps a bounded history of accepted publishes for inspection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::app::ports::{Handshake, NodeIdentity, TransportPort};
use crate::error::TransportError;
use crate::events::{Event, EventQueue};

/// A publish as seen by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub client_id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

struct Session {
    queue: Arc<EventQueue>,
    subscriptions: Vec<String>,
}

/// Publishes kept for inspection by default; older ones are forgotten.
pub const PUBLISH_HISTORY: usize = 512;

struct BrokerState {
    sessions: HashMap<String, Session>,
    retained: HashMap<String, Vec<u8>>,
    published: VecDeque<PublishRecord>,
    history: usize,
    refuse_connects: u32,
    refuse_subscribes: u32,
}

impl BrokerState {
    fn record(&mut self, record: PublishRecord) {
        if self.history == 0 {
            return;
        }
        if self.published.len() == self.history {
            self.published.pop_front();
        }
        self.published.push_back(record);
    }
}

/// Shared handle to one broker.  Cheap to clone.
#[derive(Clone)]
pub struct LoopbackBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::with_history(PUBLISH_HISTORY)
    }
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker remembering at most `history` publishes (0 keeps none).
    pub fn with_history(history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                sessions: HashMap::new(),
                retained: HashMap::new(),
                published: VecDeque::new(),
                history,
                refuse_connects: 0,
                refuse_subscribes: 0,
            })),
        }
    }

    /// A transport whose inbound traffic lands in `queue`.
    pub fn transport(&self, queue: Arc<EventQueue>) -> LoopbackTransport {
        LoopbackTransport {
            broker: self.clone(),
            queue,
            client_id: None,
        }
    }

    // ── Fault injection ───────────────────────────────────────

    /// Refuse the next `n` connect handshakes.
    pub fn refuse_connects(&self, n: u32) {
        self.lock().refuse_connects = n;
    }

    /// Refuse the next `n` subscribe requests.
    pub fn refuse_subscribes(&self, n: u32) {
        self.lock().refuse_subscribes = n;
    }

    /// Drop a client's session as if the network failed.  The client is
    /// told through its queue.  Returns `false` for unknown clients.
    pub fn drop_client(&self, client_id: &str) -> bool {
        let Some(session) = self.lock().sessions.remove(client_id) else {
            return false;
        };
        warn!("LOOPBACK: dropping client '{}'", client_id);
        session.queue.post(Event::TransportLost);
        true
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.lock().sessions.contains_key(client_id)
    }

    pub fn subscriptions(&self, client_id: &str) -> Vec<String> {
        self.lock()
            .sessions
            .get(client_id)
            .map(|s| s.subscriptions.clone())
            .unwrap_or_default()
    }

    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.lock().retained.get(topic).cloned()
    }

    /// Remembered publishes, oldest first.
    pub fn published(&self) -> Vec<PublishRecord> {
        self.lock().published.iter().cloned().collect()
    }

    /// Publishes on one topic, oldest first.
    pub fn published_on(&self, topic: &str) -> Vec<PublishRecord> {
        self.lock()
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear_published(&self) {
        self.lock().published.clear();
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One client's connection to a [`LoopbackBroker`].
pub struct LoopbackTransport {
    broker: LoopbackBroker,
    queue: Arc<EventQueue>,
    client_id: Option<String>,
}

impl LoopbackTransport {
    /// True while this transport still owns its broker session.
    fn owns_session(&self, state: &BrokerState) -> bool {
        self.client_id
            .as_ref()
            .and_then(|id| state.sessions.get(id))
            .is_some_and(|s| Arc::ptr_eq(&s.queue, &self.queue))
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

impl TransportPort for LoopbackTransport {
    fn connect(&mut self, identity: &NodeIdentity) -> Result<Handshake, TransportError> {
        let mut state = self.broker.lock();
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(TransportError::ConnectFailed);
        }
        self.queue.clear_lost();

        let session = Session {
            queue: self.queue.clone(),
            subscriptions: Vec::new(),
        };
        if let Some(old) = state.sessions.insert(identity.client_id.clone(), session) {
            if !Arc::ptr_eq(&old.queue, &self.queue) {
                info!("LOOPBACK: '{}' took over an existing session", identity.client_id);
                old.queue.post(Event::TransportLost);
            }
        }
        self.client_id = Some(identity.client_id.clone());
        debug!("LOOPBACK: '{}' connected", identity.client_id);
        Ok(Handshake::Complete)
    }

    fn subscribe(&mut self, topic: &str) -> Result<Handshake, TransportError> {
        let mut state = self.broker.lock();
        if !self.owns_session(&state) {
            return Err(TransportError::NotConnected);
        }
        if state.refuse_subscribes > 0 {
            state.refuse_subscribes -= 1;
            return Err(TransportError::SubscribeFailed);
        }

        let retained = state.retained.get(topic).cloned();
        let Some(session) = self
            .client_id
            .as_ref()
            .and_then(|id| state.sessions.get_mut(id))
        else {
            return Err(TransportError::NotConnected);
        };
        if !session.subscriptions.iter().any(|t| t == topic) {
            session.subscriptions.push(topic.to_string());
        }
        if let Some(payload) = retained {
            if let Some(ev) = Event::inbound(topic, &payload) {
                session.queue.post(ev);
            }
        }
        Ok(Handshake::Complete)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        let mut state = self.broker.lock();
        if !self.owns_session(&state) {
            return Err(TransportError::NotConnected);
        }

        if retain {
            state.retained.insert(topic.to_string(), payload.to_vec());
        }
        for session in state.sessions.values() {
            if session.subscriptions.iter().any(|t| t == topic) {
                match Event::inbound(topic, payload) {
                    Some(ev) => {
                        session.queue.post(ev);
                    }
                    None => warn!("LOOPBACK: oversized message on '{}' not delivered", topic),
                }
            }
        }
        let client_id = self.client_id.clone().unwrap_or_default();
        state.record(PublishRecord {
            client_id,
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.broker.lock();
        if self.owns_session(&state) {
            if let Some(id) = &self.client_id {
                state.sessions.remove(id);
            }
        }
        self.client_id = None;
    }
}
