//! Observer adapters.
//!
//! - [`LogObserver`]: dashboard stand-in that renders the mirror as a log
//!   line on every refresh.
//! - [`ChannelObserver`]: forwards notifications into a bounded channel
//!   for a slow consumer (chat bot, push service) on another thread.
//!   A full channel refuses the notification instead of blocking the core.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use log::{info, warn};

use crate::aggregator::StateView;
use crate::app::ports::ObserverPort;
use crate::error::ObserverError;
use crate::model::AlertLevel;

pub struct LogObserver {
    name: String,
}

impl LogObserver {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

impl ObserverPort for LogObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_state_updated(&mut self, view: &StateView) -> Result<(), ObserverError> {
        let s = &view.state;
        let fmt_opt = |v: Option<f32>| v.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"));
        let (temp, humid, gas) = match s.last_sample {
            Some(sample) => (
                fmt_opt(sample.temperature),
                fmt_opt(sample.humidity),
                sample.gas_level.to_string(),
            ),
            None => ("--".into(), "--".into(), "--".into()),
        };
        info!(
            "DASH[{}] | T={}\u{00b0}C H={}% gas={} | alert={} relay={} | {}",
            self.name,
            temp,
            humid,
            gas,
            s.last_alert,
            s.last_relay,
            if view.stale { "STALE" } else { "live" },
        );
        Ok(())
    }

    fn on_alert(&mut self, level: AlertLevel, message: &str) -> Result<(), ObserverError> {
        warn!("DASH[{}] | {} | {}", self.name, level, message);
        Ok(())
    }
}

/// A notification handed to the consumer thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    State(StateView),
    Alert { level: AlertLevel, message: String },
}

pub struct ChannelObserver {
    name: String,
    tx: SyncSender<Notification>,
}

impl ChannelObserver {
    /// Observer plus the receiving end for the consumer.
    pub fn new(name: &str, capacity: usize) -> (Self, Receiver<Notification>) {
        let (tx, rx) = sync_channel(capacity);
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }

    fn send(&self, n: Notification) -> Result<(), ObserverError> {
        self.tx.try_send(n).map_err(|e| match e {
            TrySendError::Full(_) => ObserverError::Refused("queue full".into()),
            TrySendError::Disconnected(_) => ObserverError::Unavailable,
        })
    }
}

impl ObserverPort for ChannelObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_state_updated(&mut self, view: &StateView) -> Result<(), ObserverError> {
        self.send(Notification::State(*view))
    }

    fn on_alert(&mut self, level: AlertLevel, message: &str) -> Result<(), ObserverError> {
        self.send(Notification::Alert {
            level,
            message: message.into(),
        })
    }
}
