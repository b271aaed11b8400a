//! Wire protocol: topic table and JSON message codec.
//!
//! ```text
//!  <prefix>/data     sensing ──▶ supervisory   {"type":"data","node",..,"gas","timestamp"}
//!  <prefix>/alert    sensing ──▶ supervisory   {"type":"alert","node","level","timestamp"}
//!  <prefix>/status   sensing ──▶ supervisory   {"type":"status","node","relay","uptime"}  (retained)
//!  <prefix>/control  supervisory ──▶ sensing   RELAY_ON | RELAY_OFF                      (plain text)
//! ```
//!
//! Absent temperature/humidity readings travel as JSON `null`.  Key order is
//! not significant to either side.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::MalformedMessage;
use crate::model::{AlertLevel, Millis, RelayState, SensorSample};

/// Longest topic string the node will handle.
pub const MAX_TOPIC_LEN: usize = 64;
/// Largest inbound payload accepted into the event queue.
pub const MAX_PAYLOAD_LEN: usize = 256;

pub type Topic = heapless::String<MAX_TOPIC_LEN>;
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

const CONTROL_ON: &str = "RELAY_ON";
const CONTROL_OFF: &str = "RELAY_OFF";

// ───────────────────────────────────────────────────────────────
// Topics
// ───────────────────────────────────────────────────────────────

/// The four topics of one sensing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Data,
    Alert,
    Status,
    Control,
}

impl TopicKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Alert => "alert",
            Self::Status => "status",
            Self::Control => "control",
        }
    }
}

/// Fully-qualified topic strings derived from a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    data: Topic,
    alert: Topic,
    status: Topic,
    control: Topic,
}

impl Topics {
    /// Build the topic table.  The prefix length is bounded by config
    /// validation, so every topic fits in [`MAX_TOPIC_LEN`].
    pub fn new(prefix: &str) -> Self {
        let build = |kind: TopicKind| {
            let mut t = Topic::new();
            let _ = write!(t, "{}/{}", prefix, kind.suffix());
            t
        };
        Self {
            data: build(TopicKind::Data),
            alert: build(TopicKind::Alert),
            status: build(TopicKind::Status),
            control: build(TopicKind::Control),
        }
    }

    pub fn get(&self, kind: TopicKind) -> &str {
        match kind {
            TopicKind::Data => &self.data,
            TopicKind::Alert => &self.alert,
            TopicKind::Status => &self.status,
            TopicKind::Control => &self.control,
        }
    }

    /// Reverse lookup of an inbound topic.
    pub fn kind_of(&self, topic: &str) -> Option<TopicKind> {
        [
            TopicKind::Data,
            TopicKind::Alert,
            TopicKind::Status,
            TopicKind::Control,
        ]
        .into_iter()
        .find(|k| self.get(*k) == topic)
    }
}

// ───────────────────────────────────────────────────────────────
// JSON messages
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMessage {
    pub node: String,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub gas: u16,
    pub timestamp: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub node: String,
    pub level: AlertLevel,
    pub timestamp: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub node: String,
    pub relay: RelayState,
    /// Seconds since the sensing node booted.
    pub uptime: u64,
}

/// Any JSON message, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Data(DataMessage),
    Alert(AlertMessage),
    Status(StatusMessage),
}

impl Message {
    pub fn data(node: &str, sample: &SensorSample) -> Self {
        Self::Data(DataMessage {
            node: node.into(),
            temperature: sample.temperature,
            humidity: sample.humidity,
            gas: sample.gas_level,
            timestamp: sample.captured_at,
        })
    }

    pub fn alert(node: &str, level: AlertLevel, timestamp: Millis) -> Self {
        Self::Alert(AlertMessage {
            node: node.into(),
            level,
            timestamp,
        })
    }

    pub fn status(node: &str, relay: RelayState, uptime: u64) -> Self {
        Self::Status(StatusMessage {
            node: node.into(),
            relay,
            uptime,
        })
    }

    /// The topic this message kind must travel on.
    pub fn topic_kind(&self) -> TopicKind {
        match self {
            Self::Data(_) => TopicKind::Data,
            Self::Alert(_) => TopicKind::Alert,
            Self::Status(_) => TopicKind::Status,
        }
    }

    /// Whether this kind is published with the retain flag.
    pub fn retained(&self) -> bool {
        matches!(self, Self::Status(_))
    }

    pub fn node(&self) -> &str {
        match self {
            Self::Data(m) => &m.node,
            Self::Alert(m) => &m.node,
            Self::Status(m) => &m.node,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, MalformedMessage> {
        let msg: Self = serde_json::from_slice(payload).map_err(|_| MalformedMessage::BadPayload)?;
        if msg.node().is_empty() {
            return Err(MalformedMessage::BadPayload);
        }
        Ok(msg)
    }
}

// ───────────────────────────────────────────────────────────────
// Control payloads
// ───────────────────────────────────────────────────────────────

/// Plain-text control payload for a relay action.
pub fn encode_control(action: RelayState) -> &'static str {
    match action {
        RelayState::On => CONTROL_ON,
        RelayState::Off => CONTROL_OFF,
    }
}

/// Parse a control payload; surrounding whitespace is ignored.
pub fn decode_control(payload: &[u8]) -> Result<RelayState, MalformedMessage> {
    let text = core::str::from_utf8(payload).map_err(|_| MalformedMessage::UnknownCommand)?;
    match text.trim() {
        CONTROL_ON => Ok(RelayState::On),
        CONTROL_OFF => Ok(RelayState::Off),
        _ => Err(MalformedMessage::UnknownCommand),
    }
}
