//! Mock adapters for integration tests.
//!
//! Every mock records what the node did to it so tests can assert on the
//! full call history without a broker or real hardware.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use hazardlink::aggregator::StateView;
use hazardlink::app::ports::{
    Handshake, NodeIdentity, ObserverPort, RelayPort, SensorPort, TransportPort,
};
use hazardlink::config::{NodeConfig, Role};
use hazardlink::error::{ObserverError, SensorError, TransportError};
use hazardlink::model::{AlertLevel, RelayState};
use hazardlink::protocol::Message;

pub const PREFIX: &str = "test/site";
pub const SENSING_ID: &str = "sensing-t";
pub const SUPERVISORY_ID: &str = "hub-t";

/// Short, validated intervals shared by every test.
pub fn test_config(role: Role) -> NodeConfig {
    let config = NodeConfig {
        role,
        node_id: match role {
            Role::Sensing => SENSING_ID.into(),
            Role::Supervisory => SUPERVISORY_ID.into(),
        },
        peer_node: (role == Role::Supervisory).then(|| SENSING_ID.into()),
        topic_prefix: PREFIX.into(),
        sample_interval_ms: 100,
        data_interval_ms: 200,
        status_interval_ms: 1_000,
        reconnect_check_ms: 50,
        dashboard_sync_ms: 200,
        staleness_ms: 1_000,
        alert_hold_ms: 500,
        ..NodeConfig::default()
    };
    assert!(config.validate().is_ok());
    config
}

pub fn topic(suffix: &str) -> String {
    format!("{PREFIX}/{suffix}")
}

// ── Transport ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

#[derive(Default)]
pub struct MockTransport {
    pub connected: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub refuse_connects: u32,
    pub refuse_subscribes: u32,
    pub fail_publishes: u32,
    /// Answer connect/subscribe with `Pending`, like a transport whose
    /// broker acks arrive later as events.
    pub deferred: bool,
    pub subscriptions: Vec<String>,
    pub published: Vec<Published>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    fn answer(&self) -> Handshake {
        if self.deferred {
            Handshake::Pending
        } else {
            Handshake::Complete
        }
    }

    pub fn published_on(&self, suffix: &str) -> Vec<&Published> {
        let topic = topic(suffix);
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    /// Decoded JSON messages published on a topic.
    pub fn messages_on(&self, suffix: &str) -> Vec<Message> {
        self.published_on(suffix)
            .into_iter()
            .map(|p| Message::decode(&p.payload).expect("node published invalid JSON"))
            .collect()
    }

    pub fn control_payloads(&self) -> Vec<String> {
        self.published_on("control")
            .into_iter()
            .map(|p| String::from_utf8_lossy(&p.payload).into_owned())
            .collect()
    }

    pub fn alert_levels(&self) -> Vec<AlertLevel> {
        self.messages_on("alert")
            .into_iter()
            .filter_map(|m| match m {
                Message::Alert(a) => Some(a.level),
                _ => None,
            })
            .collect()
    }

    pub fn status_relays(&self) -> Vec<RelayState> {
        self.messages_on("status")
            .into_iter()
            .filter_map(|m| match m {
                Message::Status(s) => Some(s.relay),
                _ => None,
            })
            .collect()
    }
}

impl TransportPort for MockTransport {
    fn connect(&mut self, _identity: &NodeIdentity) -> Result<Handshake, TransportError> {
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(TransportError::ConnectFailed);
        }
        self.connected = true;
        self.connects += 1;
        Ok(self.answer())
    }

    fn subscribe(&mut self, topic: &str) -> Result<Handshake, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.refuse_subscribes > 0 {
            self.refuse_subscribes -= 1;
            return Err(TransportError::SubscribeFailed);
        }
        self.subscriptions.push(topic.to_string());
        Ok(self.answer())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            return Err(TransportError::PublishFailed);
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.disconnects += 1;
    }
}

// ── Hardware ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub gas: u16,
}

pub fn reading(gas: u16) -> Reading {
    Reading {
        temperature: Some(25.0),
        humidity: Some(40.0),
        gas,
    }
}

/// Returns queued readings first, then repeats `steady`.
pub struct MockHardware {
    pub queued: VecDeque<Reading>,
    pub steady: Reading,
    pub current: Reading,
    pub relay_calls: Vec<RelayState>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            queued: VecDeque::new(),
            steady: reading(100),
            current: reading(100),
            relay_calls: Vec::new(),
        }
    }

    pub fn set(&mut self, r: Reading) {
        self.queued.clear();
        self.steady = r;
    }

    pub fn set_gas(&mut self, gas: u16) {
        self.set(reading(gas));
    }

    pub fn relay(&self) -> Option<RelayState> {
        self.relay_calls.last().copied()
    }
}

impl SensorPort for MockHardware {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.current = self.queued.pop_front().unwrap_or(self.steady);
        self.current.temperature.ok_or(SensorError::ReadFailed)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.current.humidity.ok_or(SensorError::ReadFailed)
    }

    fn read_gas(&mut self) -> u16 {
        self.current.gas
    }
}

impl RelayPort for MockHardware {
    fn set_relay(&mut self, state: RelayState) {
        self.relay_calls.push(state);
    }
}

// ── Observers ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverCall {
    State(StateView),
    Alert(AlertLevel, String),
}

pub type CallLog = Rc<RefCell<Vec<ObserverCall>>>;

pub struct MockObserver {
    name: String,
    pub log: CallLog,
    pub fail: bool,
}

#[allow(dead_code)]
impl MockObserver {
    pub fn new(name: &str) -> (Self, CallLog) {
        let log = CallLog::default();
        (
            Self {
                name: name.into(),
                log: log.clone(),
                fail: false,
            },
            log,
        )
    }

    pub fn failing(name: &str) -> (Self, CallLog) {
        let (mut obs, log) = Self::new(name);
        obs.fail = true;
        (obs, log)
    }
}

impl ObserverPort for MockObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_state_updated(&mut self, view: &StateView) -> Result<(), ObserverError> {
        self.log.borrow_mut().push(ObserverCall::State(*view));
        if self.fail {
            return Err(ObserverError::Unavailable);
        }
        Ok(())
    }

    fn on_alert(&mut self, level: AlertLevel, message: &str) -> Result<(), ObserverError> {
        self.log
            .borrow_mut()
            .push(ObserverCall::Alert(level, message.to_string()));
        if self.fail {
            return Err(ObserverError::Refused("channel down".into()));
        }
        Ok(())
    }
}

#[allow(dead_code)]
pub fn alerts(log: &CallLog) -> Vec<AlertLevel> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            ObserverCall::Alert(level, _) => Some(*level),
            ObserverCall::State(_) => None,
        })
        .collect()
}

#[allow(dead_code)]
pub fn last_state(log: &CallLog) -> Option<StateView> {
    log.borrow().iter().rev().find_map(|c| match c {
        ObserverCall::State(v) => Some(*v),
        ObserverCall::Alert(..) => None,
    })
}
