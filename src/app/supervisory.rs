//! Supervisory node service.
//!
//! [`SupervisoryNode`] mirrors the sensing node's state from its data,
//! alert and status messages, fans alert transitions out to observers and
//! sends the confirmatory relay OFF on CRITICAL.  It never drives a relay
//! itself: its copy of the relay state is a mirror.
//!
//! ```text
//!  TransportPort ──▶ ┌─────────────────────────────────┐ ──▶ ObserverPort(s)
//!   (inbound)        │        SupervisoryNode          │
//!                    │  aggregator · dispatcher · link │ ──▶ EventSink
//!  TransportPort ◀── └─────────────────────────────────┘
//!   (control)
//! ```

use log::{debug, info, warn};

use crate::aggregator::{StateAggregator, StateView, Update};
use crate::config::{NodeConfig, Role};
use crate::diagnostics::{Counter, NodeDiagnostics};
use crate::dispatcher::{AlertDispatcher, ObserverFailure};
use crate::events::{Event, Task};
use crate::model::{AlertLevel, Millis, RelayState};
use crate::protocol::{TopicKind, Topics, encode_control};
use crate::runtime::NodeCore;
use crate::scheduler::Schedule;

use super::events::AppEvent;
use super::link::NodeLink;
use super::ports::{EventSink, ObserverPort, TransportPort};

pub struct SupervisoryNode<T: TransportPort, E: EventSink> {
    node_id: String,
    /// Name used in observer messages.
    peer_label: String,
    dashboard_sync_ms: Millis,
    reconnect_check_ms: Millis,
    link: NodeLink<T>,
    aggregator: StateAggregator,
    dispatcher: AlertDispatcher,
    /// Staleness last reported through the sink.
    reported_stale: Option<bool>,
    diagnostics: NodeDiagnostics,
    started_at: Millis,
    sink: E,
}

impl<T: TransportPort, E: EventSink> SupervisoryNode<T, E> {
    pub fn new(config: &NodeConfig, transport: T, sink: E) -> Self {
        let link = NodeLink::new(
            config,
            transport,
            &[TopicKind::Data, TopicKind::Alert, TopicKind::Status],
        );
        let aggregator = StateAggregator::new(
            Topics::new(&config.topic_prefix),
            config.peer_node.clone(),
            config.staleness_ms,
            config.alert_hold_ms,
        );
        Self {
            node_id: config.node_id.clone(),
            peer_label: config
                .peer_node
                .clone()
                .unwrap_or_else(|| "sensing node".into()),
            dashboard_sync_ms: config.dashboard_sync_ms,
            reconnect_check_ms: config.reconnect_check_ms,
            link,
            aggregator,
            dispatcher: AlertDispatcher::new(),
            reported_stale: None,
            diagnostics: NodeDiagnostics::new(),
            started_at: 0,
            sink,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn ObserverPort>) {
        self.dispatcher.add_observer(observer);
    }

    // ── Event handlers ────────────────────────────────────────

    /// Apply one inbound message to the mirror.
    pub fn on_message(&mut self, topic: &str, payload: &[u8], now: Millis) {
        let update = match self.aggregator.on_message(topic, payload, now) {
            Ok(update) => update,
            Err(e) => {
                self.diagnostics.record(Counter::Malformed);
                self.sink.emit(&AppEvent::MalformedMessage(e));
                return;
            }
        };

        match update {
            Update::Alert { from, to } if from != to => self.on_alert_transition(from, to, now),
            Update::Relay { from, to } if from != to => {
                info!("SUPERVISORY: mirrored relay {} -> {}", from, to);
                self.sync_observers(now);
            }
            _ => {}
        }
    }

    /// Ask the sensing node to switch its relay (operator action).
    ///
    /// Returns `false` when the command could not be sent.  A remote ON is
    /// still subject to the sensing node's latch.
    pub fn command_relay(&mut self, action: RelayState, now: Millis) -> bool {
        let sent = self.link.publish(
            TopicKind::Control,
            encode_control(action).as_bytes(),
            false,
            now,
            &mut self.diagnostics,
            &mut self.sink,
        );
        if sent {
            info!("SUPERVISORY: relay {} requested", action);
            self.sink.emit(&AppEvent::RelayCommandSent(action));
        } else {
            warn!("SUPERVISORY: relay {} request not sent", action);
        }
        sent
    }

    /// Periodic observer refresh: decay the alert, surface staleness edges
    /// and push the current view.
    pub fn dashboard_sync(&mut self, now: Millis) {
        if let Some(Update::Alert { from, to }) = self.aggregator.expire_alert(now) {
            self.on_alert_transition(from, to, now);
        }

        let view = self.aggregator.view(now);
        if self.reported_stale != Some(view.stale) {
            self.reported_stale = Some(view.stale);
            if view.stale {
                warn!("SUPERVISORY: mirror stale (age {:?}ms)", view.age_ms);
                self.sink.emit(&AppEvent::MirrorStale { age_ms: view.age_ms });
            } else {
                info!("SUPERVISORY: mirror fresh");
                self.sink.emit(&AppEvent::MirrorFresh);
            }
        }

        let failures = self.dispatcher.notify_state(&view);
        self.record_failures(failures);
    }

    pub fn reconnect_check(&mut self, now: Millis) {
        self.link.poll(now, &mut self.diagnostics, &mut self.sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn view(&self, now: Millis) -> StateView {
        self.aggregator.view(now)
    }

    pub fn aggregator(&self) -> &StateAggregator {
        &self.aggregator
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

    pub fn sink(&self) -> &E {
        &self.sink
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_alert_transition(&mut self, from: AlertLevel, to: AlertLevel, now: Millis) {
        self.sink.emit(&AppEvent::AlertTransition { from, to });
        let dispatch = self.dispatcher.on_alert_transition(to, &self.peer_label);
        if let Some(cmd) = dispatch.command {
            self.command_relay(cmd.action, now);
        }
        self.record_failures(dispatch.failures);
    }

    fn sync_observers(&mut self, now: Millis) {
        let view = self.aggregator.view(now);
        let failures = self.dispatcher.notify_state(&view);
        self.record_failures(failures);
    }

    fn record_failures(&mut self, failures: Vec<ObserverFailure>) {
        for f in failures {
            self.diagnostics.record(Counter::ObserverFailure);
            self.sink.emit(&AppEvent::ObserverFailed {
                observer: f.observer,
                error: f.error,
            });
        }
    }
}

impl<T: TransportPort, E: EventSink> NodeCore for SupervisoryNode<T, E> {
    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule {
                task: Task::ReconnectCheck,
                interval_ms: self.reconnect_check_ms,
                immediate: true,
            },
            Schedule {
                task: Task::DashboardSync,
                interval_ms: self.dashboard_sync_ms,
                immediate: false,
            },
        ]
    }

    fn start(&mut self, now: Millis) {
        self.started_at = now;
        self.sink.emit(&AppEvent::Started(Role::Supervisory));
        info!(
            "SUPERVISORY: node '{}' started with {} observers",
            self.node_id,
            self.dispatcher.observer_count()
        );
    }

    fn handle(&mut self, event: Event, now: Millis) {
        match event {
            Event::Scheduled(Task::DashboardSync) => {
                self.dashboard_sync(now);
                let uptime = now.saturating_sub(self.started_at) / 1_000;
                debug!(
                    "SUPERVISORY: diagnostics {}",
                    self.diagnostics.snapshot(uptime).to_json()
                );
            }
            Event::Scheduled(Task::ReconnectCheck) => self.reconnect_check(now),
            Event::Scheduled(Task::Sample | Task::PublishData | Task::PublishStatus) => {}
            Event::Inbound { topic, payload } => self.on_message(&topic, &payload, now),
            Event::TransportLost => self.link.lost(now, &mut self.sink),
            Event::Ack(ack) => {
                self.link.on_ack(ack, now, &mut self.diagnostics, &mut self.sink);
            }
        }
    }

    fn diagnostics_mut(&mut self) -> &mut NodeDiagnostics {
        &mut self.diagnostics
    }
}
