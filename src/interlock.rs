//! Relay interlock.
//!
//! Owns the single authoritative [`RelayState`] on the sensing node and
//! arbitrates between local safety overrides and remote commands.
//!
//! ## Latch lifecycle
//!
//! 1. A CRITICAL classification forces the relay OFF and sets the latch.
//! 2. While latched, a remote ON is rejected; a remote OFF is accepted.
//! 3. The next non-CRITICAL classification clears the latch.  Clearing
//!    does not touch the relay: an explicit ON is needed to restore output.
//!
//! Writes are write-if-different, so repeated CRITICAL classifications
//! leave the state untouched after the first.

use log::{error, info, warn};

use crate::app::commands::{CommandOrigin, RelayCommand};
use crate::error::RejectedCommand;
use crate::model::{AlertLevel, RelayState};

/// An accepted change of relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTransition {
    pub from: RelayState,
    pub to: RelayState,
    pub origin: CommandOrigin,
}

/// Result of an accepted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The relay moved; a status emission is due.
    Applied(RelayTransition),
    /// The relay was already in the requested state.
    Unchanged,
}

/// Relay state machine with a one-way safety latch.
pub struct RelayInterlock {
    state: RelayState,
    /// Set by CRITICAL, cleared by the next non-CRITICAL classification.
    latched: bool,
    /// Origin of the last accepted transition.
    last_origin: Option<CommandOrigin>,
}

impl RelayInterlock {
    pub fn new(initial: RelayState) -> Self {
        Self {
            state: initial,
            latched: false,
            last_origin: None,
        }
    }

    /// Feed the latest local classification.
    ///
    /// Returns the transition when CRITICAL switched the relay OFF.
    pub fn on_local_classification(&mut self, level: AlertLevel) -> Option<RelayTransition> {
        if level == AlertLevel::Critical {
            if !self.latched {
                error!("INTERLOCK LATCHED: CRITICAL classification, relay forced OFF");
            }
            self.latched = true;
            return self.write(RelayCommand::local_safety_off());
        }

        if self.latched {
            info!("INTERLOCK CLEARED: classification {level}, relay stays {}", self.state);
            self.latched = false;
        }
        None
    }

    /// Apply a command from the supervisory node.
    pub fn on_remote_command(
        &mut self,
        action: RelayState,
    ) -> Result<CommandOutcome, RejectedCommand> {
        self.apply(RelayCommand::remote(action))
    }

    /// Apply any command, honouring the latch for remote ON requests.
    pub fn apply(&mut self, cmd: RelayCommand) -> Result<CommandOutcome, RejectedCommand> {
        if self.latched && cmd.origin == CommandOrigin::Remote && cmd.action == RelayState::On {
            warn!("INTERLOCK: remote ON rejected while latched");
            return Err(RejectedCommand::LatchedOff);
        }
        Ok(match self.write(cmd) {
            Some(t) => CommandOutcome::Applied(t),
            None => CommandOutcome::Unchanged,
        })
    }

    /// Current authoritative relay state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// True while the CRITICAL latch blocks remote ON.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Origin of the last accepted transition, if any.
    pub fn last_origin(&self) -> Option<CommandOrigin> {
        self.last_origin
    }

    // ── Internal ──────────────────────────────────────────────────

    fn write(&mut self, cmd: RelayCommand) -> Option<RelayTransition> {
        if self.state == cmd.action {
            return None;
        }
        let t = RelayTransition {
            from: self.state,
            to: cmd.action,
            origin: cmd.origin,
        };
        info!("INTERLOCK: relay {} -> {} ({:?})", t.from, t.to, t.origin);
        self.state = cmd.action;
        self.last_origin = Some(cmd.origin);
        Some(t)
    }
}
