//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one
//! pipe-separated log line, tagged by subsystem.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] through the `log` facade.
pub struct LogEventSink {
    node: String,
}

impl LogEventSink {
    pub fn new(node: &str) -> Self {
        Self { node: node.into() }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let node = &self.node;
        match event {
            AppEvent::Started(role) => info!("START | {} | role={:?}", node, role),
            AppEvent::ConnectionChanged { from, to } => {
                info!("CONN | {} | {:?} -> {:?}", node, from, to);
            }
            AppEvent::RelayChanged(t) => {
                info!("RELAY | {} | {} -> {} ({:?})", node, t.from, t.to, t.origin);
            }
            AppEvent::CommandRejected { action } => {
                warn!("RELAY | {} | remote {} rejected, latch held", node, action);
            }
            AppEvent::AlertRaised(level) => warn!("ALERT | {} | {}", node, level),
            AppEvent::MalformedMessage(reason) => {
                warn!("MSG | {} | discarded: {}", node, reason);
            }
            AppEvent::AlertTransition { from, to } => {
                info!("ALERT | {} | mirror {} -> {}", node, from, to);
            }
            AppEvent::RelayCommandSent(action) => {
                info!("RELAY | {} | command {} sent", node, action);
            }
            AppEvent::MirrorStale { age_ms } => match age_ms {
                Some(age) => warn!("MIRROR | {} | stale, last update {}ms ago", node, age),
                None => warn!("MIRROR | {} | stale, nothing received yet", node),
            },
            AppEvent::MirrorFresh => info!("MIRROR | {} | fresh", node),
            AppEvent::ObserverFailed { observer, error: e } => {
                error!("OBSERVER | {} | '{}' failed: {}", node, observer, e);
            }
        }
    }
}

/// Keeps every event in memory.  Handy for tests and the simulator's
/// end-of-run summary.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

/// Sends every event to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: &AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
