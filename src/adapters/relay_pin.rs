//! Relay output over a digital pin.
//!
//! [`RelayPin`] implements [`RelayPort`] for any `embedded_hal` output pin,
//! with the relay board's polarity configurable.  [`SimPin`] is an
//! in-memory pin for host builds whose level can be probed from another
//! thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{error, info};

use crate::app::ports::RelayPort;
use crate::model::RelayState;

/// Pin level that energises the relay coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

pub struct RelayPin<P: OutputPin> {
    pin: P,
    polarity: Polarity,
    /// Last state successfully written to the pin.
    driven: Option<RelayState>,
    write_errors: u32,
}

impl<P: OutputPin> RelayPin<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self {
            pin,
            polarity,
            driven: None,
            write_errors: 0,
        }
    }

    /// State last driven onto the pin, `None` before the first write or
    /// after a failed one.
    pub fn driven(&self) -> Option<RelayState> {
        self.driven
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }
}

impl<P: OutputPin> RelayPort for RelayPin<P> {
    fn set_relay(&mut self, state: RelayState) {
        let high = state.is_on() == (self.polarity == Polarity::ActiveHigh);
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => {
                self.driven = Some(state);
                info!("RELAY: output {} (pin {})", state, if high { "high" } else { "low" });
            }
            Err(e) => {
                self.driven = None;
                self.write_errors = self.write_errors.saturating_add(1);
                error!("RELAY: pin write failed: {:?}", e);
            }
        }
    }
}

/// In-memory output pin.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that reads the same level as this pin.
    pub fn probe(&self) -> Self {
        self.clone()
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

impl ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::Relaxed);
        Ok(())
    }
}
