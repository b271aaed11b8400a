//! Alert dispatcher: fans alert transitions out to observers and decides
//! whether a confirmatory relay command is due.
//!
//! Observers are called one at a time and each call is isolated: a failing
//! observer is logged and reported back, and the remaining observers are
//! still notified.  Nothing an observer does can undo aggregation or stop
//! the relay command.

use log::{info, warn};

use crate::aggregator::StateView;
use crate::app::commands::RelayCommand;
use crate::app::ports::ObserverPort;
use crate::error::ObserverError;
use crate::model::{AlertLevel, RelayState};

/// One observer call that returned an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverFailure {
    pub observer: String,
    pub error: ObserverError,
}

/// Result of dispatching one alert transition.
#[derive(Debug, Default, PartialEq)]
pub struct Dispatch {
    /// Command to publish to the sensing node, if any.
    pub command: Option<RelayCommand>,
    pub failures: Vec<ObserverFailure>,
}

#[derive(Default)]
pub struct AlertDispatcher {
    observers: Vec<Box<dyn ObserverPort>>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ObserverPort>) {
        info!("DISPATCH: observer '{}' registered", observer.name());
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// React to a change of the mirrored alert level.
    ///
    /// - CRITICAL: remote OFF plus a CRITICAL notification to every observer
    /// - WARNING: notification only
    /// - NORMAL: nothing
    pub fn on_alert_transition(&mut self, level: AlertLevel, node: &str) -> Dispatch {
        match level {
            AlertLevel::Normal => Dispatch::default(),
            AlertLevel::Warning => Dispatch {
                command: None,
                failures: self.notify_alert(level, &format!("WARNING: elevated readings on {node}")),
            },
            AlertLevel::Critical => {
                warn!("DISPATCH: CRITICAL on {}, requesting relay OFF", node);
                Dispatch {
                    command: Some(RelayCommand::remote(RelayState::Off)),
                    failures: self.notify_alert(
                        level,
                        &format!("CRITICAL: hazard on {node}, relay OFF requested"),
                    ),
                }
            }
        }
    }

    /// Push the current mirror to every observer.
    pub fn notify_state(&mut self, view: &StateView) -> Vec<ObserverFailure> {
        self.each_observer(|o| o.on_state_updated(view))
    }

    fn notify_alert(&mut self, level: AlertLevel, message: &str) -> Vec<ObserverFailure> {
        self.each_observer(|o| o.on_alert(level, message))
    }

    fn each_observer(
        &mut self,
        mut call: impl FnMut(&mut dyn ObserverPort) -> Result<(), ObserverError>,
    ) -> Vec<ObserverFailure> {
        let mut failures = Vec::new();
        for observer in &mut self.observers {
            if let Err(error) = call(observer.as_mut()) {
                warn!("DISPATCH: observer '{}' failed: {}", observer.name(), error);
                failures.push(ObserverFailure {
                    observer: observer.name().to_string(),
                    error,
                });
            }
        }
        failures
    }
}
