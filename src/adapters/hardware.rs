//! Hardware adapter: bridges a sensor source and a relay output to the
//! sensing node.
//!
//! The sensing node needs one value that is both a [`SensorPort`] and a
//! [`RelayPort`]; this adapter pairs any two implementations so either
//! side can be swapped (simulated sensor with a real pin, scripted sensor
//! with an in-memory pin, ...).

use crate::app::ports::{RelayPort, SensorPort};
use crate::error::SensorError;
use crate::model::RelayState;

pub struct NodeHardware<S, R> {
    pub sensor: S,
    pub relay: R,
}

impl<S: SensorPort, R: RelayPort> NodeHardware<S, R> {
    pub fn new(sensor: S, relay: R) -> Self {
        Self { sensor, relay }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<S: SensorPort, R> SensorPort for NodeHardware<S, R> {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.sensor.read_temperature()
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.sensor.read_humidity()
    }

    fn read_gas(&mut self) -> u16 {
        self.sensor.read_gas()
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<S, R: RelayPort> RelayPort for NodeHardware<S, R> {
    fn set_relay(&mut self, state: RelayState) {
        self.relay.set_relay(state);
    }
}
