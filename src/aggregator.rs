//! Supervisory state aggregator.
//!
//! Keeps the last-known mirror of the sensing node.  Every inbound message
//! is fully decoded and validated before anything is written, so a bad
//! payload can never leave the mirror half-updated.
//!
//! Validation order:
//! 1. topic must be one of this node's sensing topics
//! 2. payload must decode as a typed JSON message
//! 3. the declared `type` must match the topic it arrived on
//! 4. the `node` field must match the expected peer, when one is configured

use log::{debug, info, warn};

use crate::error::MalformedMessage;
use crate::model::{AlertLevel, Millis, RelayState, SensorSample};
use crate::protocol::{Message, TopicKind, Topics};

/// Last-known state of the sensing node, as seen by the supervisory node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MirroredState {
    pub last_sample: Option<SensorSample>,
    pub last_alert: AlertLevel,
    /// Mirrored copy; only the sensing node's interlock is authoritative.
    pub last_relay: RelayState,
    /// Local receive time of the last accepted message.
    pub last_updated_at: Option<Millis>,
}

/// What observers receive: the mirror plus its freshness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateView {
    pub state: MirroredState,
    /// `None` until the first message arrives.
    pub age_ms: Option<Millis>,
    pub stale: bool,
}

/// A change applied to the mirror.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    Sample(SensorSample),
    /// `from == to` when the same level was reported again.
    Alert { from: AlertLevel, to: AlertLevel },
    Relay { from: RelayState, to: RelayState },
}

impl Update {
    /// The new level when this update moved the mirrored alert level.
    pub fn alert_transition(&self) -> Option<AlertLevel> {
        match *self {
            Self::Alert { from, to } if from != to => Some(to),
            _ => None,
        }
    }
}

pub struct StateAggregator {
    topics: Topics,
    peer: Option<String>,
    state: MirroredState,
    /// Local time of the last Alert message, used for decay.
    last_alert_at: Option<Millis>,
    staleness_ms: Millis,
    alert_hold_ms: Millis,
    malformed: u32,
}

impl StateAggregator {
    pub fn new(
        topics: Topics,
        peer: Option<String>,
        staleness_ms: Millis,
        alert_hold_ms: Millis,
    ) -> Self {
        Self {
            topics,
            peer,
            state: MirroredState::default(),
            last_alert_at: None,
            staleness_ms,
            alert_hold_ms,
            malformed: 0,
        }
    }

    /// Validate and apply one inbound message.
    ///
    /// On error nothing is mutated except the malformed counter.
    pub fn on_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: Millis,
    ) -> Result<Update, MalformedMessage> {
        match self.validate(topic, payload) {
            Ok(msg) => Ok(self.apply(msg, now)),
            Err(e) => {
                self.malformed = self.malformed.saturating_add(1);
                warn!("AGGREGATOR: discarded message on '{}': {}", topic, e);
                Err(e)
            }
        }
    }

    /// Decay the mirrored alert to NORMAL once no Alert has arrived for the
    /// hold time.  The sensing node never publishes NORMAL alerts.
    pub fn expire_alert(&mut self, now: Millis) -> Option<Update> {
        if self.state.last_alert == AlertLevel::Normal {
            return None;
        }
        let since = self.last_alert_at?;
        if now.saturating_sub(since) < self.alert_hold_ms {
            return None;
        }
        let from = self.state.last_alert;
        self.state.last_alert = AlertLevel::Normal;
        info!("AGGREGATOR: {} alert expired after {}ms quiet", from, self.alert_hold_ms);
        Some(Update::Alert {
            from,
            to: AlertLevel::Normal,
        })
    }

    pub fn state(&self) -> &MirroredState {
        &self.state
    }

    /// Milliseconds since the last accepted message.
    pub fn age(&self, now: Millis) -> Option<Millis> {
        self.state
            .last_updated_at
            .map(|at| now.saturating_sub(at))
    }

    /// Never-updated counts as stale.
    pub fn is_stale(&self, now: Millis) -> bool {
        self.age(now).is_none_or(|age| age > self.staleness_ms)
    }

    pub fn view(&self, now: Millis) -> StateView {
        StateView {
            state: self.state,
            age_ms: self.age(now),
            stale: self.is_stale(now),
        }
    }

    /// Messages discarded since start.
    pub fn malformed_count(&self) -> u32 {
        self.malformed
    }

    // ── Internal ──────────────────────────────────────────────────

    fn validate(&self, topic: &str, payload: &[u8]) -> Result<Message, MalformedMessage> {
        let kind = match self.topics.kind_of(topic) {
            Some(TopicKind::Control) | None => return Err(MalformedMessage::UnknownTopic),
            Some(kind) => kind,
        };
        let msg = Message::decode(payload)?;
        if msg.topic_kind() != kind {
            return Err(MalformedMessage::TopicMismatch);
        }
        if let Some(peer) = &self.peer {
            if msg.node() != peer {
                return Err(MalformedMessage::UnexpectedNode);
            }
        }
        Ok(msg)
    }

    fn apply(&mut self, msg: Message, now: Millis) -> Update {
        self.state.last_updated_at = Some(now);
        match msg {
            Message::Data(m) => {
                let sample = SensorSample::new(m.temperature, m.humidity, m.gas, m.timestamp);
                self.state.last_sample = Some(sample);
                debug!("AGGREGATOR: sample from {} gas={}", m.node, m.gas);
                Update::Sample(sample)
            }
            Message::Alert(m) => {
                let from = self.state.last_alert;
                self.state.last_alert = m.level;
                self.last_alert_at = Some(now);
                if from != m.level {
                    info!("AGGREGATOR: alert {} -> {} from {}", from, m.level, m.node);
                }
                Update::Alert { from, to: m.level }
            }
            Message::Status(m) => {
                let from = self.state.last_relay;
                self.state.last_relay = m.relay;
                Update::Relay { from, to: m.relay }
            }
        }
    }
}
