//! Sensing node service.
//!
//! [`SensingNode`] owns the authoritative relay state.  Every sample cycle
//! reads the sensors, classifies the sample, lets the interlock react and
//! publishes an alert while the level is above NORMAL.  Remote commands
//! arrive on the control topic and go through the same interlock.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ TransportPort
//!                 │         SensingNode          │
//!   RelayPort ◀── │  classify · interlock · link │ ──▶ EventSink
//!                 └──────────────────────────────┘
//! ```

use log::{debug, error, info};

use crate::config::{NodeConfig, Role, Thresholds};
use crate::diagnostics::{Counter, NodeDiagnostics};
use crate::error::{Error, MalformedMessage, Result};
use crate::events::{Event, Task, TransportAck};
use crate::interlock::{CommandOutcome, RelayInterlock, RelayTransition};
use crate::model::{AlertLevel, Millis, RelayState, SensorSample};
use crate::protocol::{Message, TopicKind, decode_control};
use crate::runtime::NodeCore;
use crate::scheduler::Schedule;
use crate::threshold::classify;

use super::events::AppEvent;
use super::link::NodeLink;
use super::ports::{EventSink, RelayPort, SensorPort, TransportPort};

pub struct SensingNode<T, H, E>
where
    T: TransportPort,
    H: SensorPort + RelayPort,
    E: EventSink,
{
    node_id: String,
    thresholds: Thresholds,
    intervals: Intervals,
    link: NodeLink<T>,
    interlock: RelayInterlock,
    last_sample: Option<SensorSample>,
    last_level: AlertLevel,
    started_at: Millis,
    diagnostics: NodeDiagnostics,
    hw: H,
    sink: E,
}

#[derive(Debug, Clone, Copy)]
struct Intervals {
    sample: Millis,
    data: Millis,
    status: Millis,
    reconnect: Millis,
}

impl<T, H, E> SensingNode<T, H, E>
where
    T: TransportPort,
    H: SensorPort + RelayPort,
    E: EventSink,
{
    /// The relay starts OFF until something explicitly turns it on.
    pub fn new(config: &NodeConfig, transport: T, hw: H, sink: E) -> Self {
        Self {
            node_id: config.node_id.clone(),
            thresholds: config.thresholds,
            intervals: Intervals {
                sample: config.sample_interval_ms,
                data: config.data_interval_ms,
                status: config.status_interval_ms,
                reconnect: config.reconnect_check_ms,
            },
            link: NodeLink::new(config, transport, &[TopicKind::Control]),
            interlock: RelayInterlock::new(RelayState::Off),
            last_sample: None,
            last_level: AlertLevel::Normal,
            started_at: 0,
            diagnostics: NodeDiagnostics::new(),
            hw,
            sink,
        }
    }

    // ── Event handlers ────────────────────────────────────────

    /// One classification cycle.
    ///
    /// The local safety reaction runs before anything is published, so a
    /// CRITICAL sample switches the relay OFF even while offline.
    pub fn sample_cycle(&mut self, now: Millis) {
        let sample = self.hw.read(now);
        let level = classify(&sample, &self.thresholds);
        self.last_sample = Some(sample);

        if let Some(t) = self.interlock.on_local_classification(level) {
            self.apply_transition(t, now);
        }

        if level != self.last_level {
            info!("SENSING: level {} -> {}", self.last_level, level);
            self.last_level = level;
        }

        if level != AlertLevel::Normal {
            self.sink.emit(&AppEvent::AlertRaised(level));
            self.publish(&Message::alert(&self.node_id, level, now), now);
        }
    }

    /// Handle a payload from the control topic.
    pub fn on_control(&mut self, topic: &str, payload: &[u8], now: Millis) {
        match self.remote_command(topic, payload) {
            Ok(CommandOutcome::Applied(t)) => self.apply_transition(t, now),
            Ok(CommandOutcome::Unchanged) => {
                debug!("SENSING: relay already {}", self.interlock.state());
            }
            Err(Error::Malformed(e)) => {
                self.diagnostics.record(Counter::Malformed);
                error!("SENSING: discarded control message on '{}': {}", topic, e);
                self.sink.emit(&AppEvent::MalformedMessage(e));
            }
            Err(Error::Rejected(e)) => {
                self.diagnostics.record(Counter::Rejected);
                info!("SENSING: remote {} refused: {}", RelayState::On, e);
                self.sink.emit(&AppEvent::CommandRejected {
                    action: RelayState::On,
                });
            }
            Err(e) => error!("SENSING: control message failed: {}", e),
        }
    }

    pub fn publish_data(&mut self, now: Millis) {
        match self.last_sample {
            Some(sample) => self.publish(&Message::data(&self.node_id, &sample), now),
            None => debug!("SENSING: no sample yet, data publish skipped"),
        }
    }

    /// Publish the retained status with the current relay state.
    pub fn publish_status(&mut self, now: Millis) {
        let msg = Message::status(&self.node_id, self.interlock.state(), self.uptime_secs(now));
        self.publish(&msg, now);
    }

    pub fn reconnect_check(&mut self, now: Millis) {
        if self.link.poll(now, &mut self.diagnostics, &mut self.sink) {
            self.on_session_opened(now);
        }
    }

    pub fn on_ack(&mut self, ack: TransportAck, now: Millis) {
        if self.link.on_ack(ack, now, &mut self.diagnostics, &mut self.sink) {
            self.on_session_opened(now);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn relay_state(&self) -> RelayState {
        self.interlock.state()
    }

    pub fn interlock(&self) -> &RelayInterlock {
        &self.interlock
    }

    pub fn last_sample(&self) -> Option<&SensorSample> {
        self.last_sample.as_ref()
    }

    pub fn link(&self) -> &NodeLink<T> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut NodeLink<T> {
        &mut self.link
    }

    pub fn diagnostics(&self) -> NodeDiagnostics {
        self.diagnostics
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn uptime_secs(&self, now: Millis) -> u64 {
        now.saturating_sub(self.started_at) / 1_000
    }

    // ── Internal ──────────────────────────────────────────────

    /// Decode a control payload and run it through the interlock.  Only a
    /// remote ON can be rejected.
    fn remote_command(&mut self, topic: &str, payload: &[u8]) -> Result<CommandOutcome> {
        if topic != self.link.topics().get(TopicKind::Control) {
            return Err(MalformedMessage::UnknownTopic.into());
        }
        let action = decode_control(payload)?;
        Ok(self.interlock.on_remote_command(action)?)
    }

    /// Supervisory nodes that joined while we were away recover the relay
    /// state from this retained message.
    fn on_session_opened(&mut self, now: Millis) {
        self.publish_status(now);
    }

    fn apply_transition(&mut self, t: RelayTransition, now: Millis) {
        self.hw.set_relay(t.to);
        self.sink.emit(&AppEvent::RelayChanged(t));
        self.publish_status(now);
    }

    fn publish(&mut self, msg: &Message, now: Millis) {
        let payload = match msg.encode() {
            Ok(p) => p,
            Err(e) => {
                error!("SENSING: cannot encode {:?}: {}", msg.topic_kind(), e);
                return;
            }
        };
        self.link.publish(
            msg.topic_kind(),
            &payload,
            msg.retained(),
            now,
            &mut self.diagnostics,
            &mut self.sink,
        );
    }
}

impl<T, H, E> NodeCore for SensingNode<T, H, E>
where
    T: TransportPort,
    H: SensorPort + RelayPort,
    E: EventSink,
{
    fn schedules(&self) -> Vec<Schedule> {
        let every = |task, interval_ms, immediate| Schedule {
            task,
            interval_ms,
            immediate,
        };
        vec![
            every(Task::ReconnectCheck, self.intervals.reconnect, true),
            every(Task::Sample, self.intervals.sample, true),
            every(Task::PublishData, self.intervals.data, false),
            every(Task::PublishStatus, self.intervals.status, false),
        ]
    }

    fn start(&mut self, now: Millis) {
        self.started_at = now;
        self.hw.set_relay(self.interlock.state());
        self.sink.emit(&AppEvent::Started(Role::Sensing));
        info!(
            "SENSING: node '{}' started, relay {}",
            self.node_id,
            self.interlock.state()
        );
    }

    fn handle(&mut self, event: Event, now: Millis) {
        match event {
            Event::Scheduled(Task::Sample) => self.sample_cycle(now),
            Event::Scheduled(Task::PublishData) => self.publish_data(now),
            Event::Scheduled(Task::PublishStatus) => {
                self.publish_status(now);
                debug!(
                    "SENSING: diagnostics {}",
                    self.diagnostics.snapshot(self.uptime_secs(now)).to_json()
                );
            }
            Event::Scheduled(Task::ReconnectCheck) => self.reconnect_check(now),
            Event::Scheduled(Task::DashboardSync) => {}
            Event::Inbound { topic, payload } => self.on_control(&topic, &payload, now),
            Event::TransportLost => self.link.lost(now, &mut self.sink),
            Event::Ack(ack) => self.on_ack(ack, now),
        }
    }

    fn diagnostics_mut(&mut self) -> &mut NodeDiagnostics {
        &mut self.diagnostics
    }
}
