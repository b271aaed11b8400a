//! Relay commands.
//!
//! Both the local safety logic and the supervisory node drive the relay
//! through [`RelayCommand`]s; the [`RelayInterlock`](crate::interlock::RelayInterlock)
//! arbitrates between them using the `origin` tag.

use crate::model::RelayState;

/// Who asked for a relay change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// The sensing node's own CRITICAL classification.
    LocalSafety,
    /// A control message from the supervisory node.
    Remote,
}

/// A request to drive the relay to `action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub action: RelayState,
    pub origin: CommandOrigin,
}

impl RelayCommand {
    pub const fn remote(action: RelayState) -> Self {
        Self {
            action,
            origin: CommandOrigin::Remote,
        }
    }

    pub const fn local_safety_off() -> Self {
        Self {
            action: RelayState::Off,
            origin: CommandOrigin::LocalSafety,
        }
    }
}
