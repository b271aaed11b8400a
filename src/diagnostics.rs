//! Runtime diagnostics.
//!
//! Per-node counters for everything the node survives without stopping:
//! discarded messages, refused commands, publish trouble, reconnects and
//! observer errors.  A snapshot is logged with every status refresh or
//! dashboard sync, and the binaries install a panic hook that routes the
//! panic reason through the logger before the process dies.

use serde::Serialize;

/// Counters since the node started.  All saturate instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeDiagnostics {
    pub uptime_secs: u64,
    pub malformed_messages: u32,
    pub rejected_commands: u32,
    /// Publishes skipped because the node was disconnected.
    pub dropped_publishes: u32,
    /// Publishes that failed at the transport.
    pub publish_failures: u32,
    pub reconnect_attempts: u32,
    pub connects: u32,
    pub observer_failures: u32,
    pub queue_overflows: u32,
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Malformed,
    Rejected,
    DroppedPublish,
    PublishFailure,
    ReconnectAttempt,
    Connect,
    ObserverFailure,
}

impl NodeDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, counter: Counter) {
        let slot = match counter {
            Counter::Malformed => &mut self.malformed_messages,
            Counter::Rejected => &mut self.rejected_commands,
            Counter::DroppedPublish => &mut self.dropped_publishes,
            Counter::PublishFailure => &mut self.publish_failures,
            Counter::ReconnectAttempt => &mut self.reconnect_attempts,
            Counter::Connect => &mut self.connects,
            Counter::ObserverFailure => &mut self.observer_failures,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn record_n(&mut self, counter: Counter, n: usize) {
        for _ in 0..n {
            self.record(counter);
        }
    }

    /// Copy with the uptime stamped in.
    pub fn snapshot(&self, uptime_secs: u64) -> Self {
        Self {
            uptime_secs,
            ..*self
        }
    }

    /// One-line JSON rendering for the log.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// True when nothing has gone wrong yet.
    pub fn is_clean(&self) -> bool {
        let Self {
            uptime_secs: _,
            reconnect_attempts: _,
            connects: _,
            malformed_messages,
            rejected_commands,
            dropped_publishes,
            publish_failures,
            observer_failures,
            queue_overflows,
        } = *self;
        [
            malformed_messages,
            rejected_commands,
            dropped_publishes,
            publish_failures,
            observer_failures,
            queue_overflows,
        ]
        .iter()
        .all(|c| *c == 0)
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Route panics through the logger so they land in the same sink as the
/// rest of the node's output.  Call once at startup, after the logger.
pub fn install_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
        default_hook(info);
    }));
}
