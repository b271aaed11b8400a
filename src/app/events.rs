//! Outbound application events.
//!
//! The node services emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log to the console, count them, forward
//! them to a local display.

use crate::config::Role;
use crate::connection::ConnectionState;
use crate::error::{MalformedMessage, ObserverError};
use crate::interlock::RelayTransition;
use crate::model::{AlertLevel, Millis, RelayState};

/// Structured events emitted by the node cores.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The node service has started.
    Started(Role),

    /// The connection manager changed state.
    ConnectionChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Sensing: the interlock accepted a relay transition.
    RelayChanged(RelayTransition),

    /// Sensing: a remote command was refused by the latch.  Nothing is
    /// sent back on the wire; this is the local rejection signal.
    CommandRejected { action: RelayState },

    /// Sensing: this classification cycle is not NORMAL.
    AlertRaised(AlertLevel),

    /// An inbound message was discarded.
    MalformedMessage(MalformedMessage),

    /// Supervisory: the mirrored alert level changed.
    AlertTransition { from: AlertLevel, to: AlertLevel },

    /// Supervisory: a relay command was published to the sensing node.
    RelayCommandSent(RelayState),

    /// Supervisory: mirrored state crossed the staleness bound.
    MirrorStale { age_ms: Option<Millis> },

    /// Supervisory: mirrored state is fresh again.
    MirrorFresh,

    /// Supervisory: an observer failed; the others were still notified.
    ObserverFailed { observer: String, error: ObserverError },
}
