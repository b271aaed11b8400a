//! Simulated sensor source for host builds.
//!
//! Replays a list of readings in a loop.  A `None` climate reading is
//! reported as a failed read, the way a DHT-style sensor drops out.

use crate::app::ports::SensorPort;
use crate::error::SensorError;

/// One scripted reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub gas: u16,
}

impl SimReading {
    pub const fn new(temperature: Option<f32>, humidity: Option<f32>, gas: u16) -> Self {
        Self {
            temperature,
            humidity,
            gas,
        }
    }
}

pub struct SimSensor {
    script: Vec<SimReading>,
    cursor: usize,
}

const SILENT: SimReading = SimReading::new(None, None, 0);

impl SimSensor {
    /// An empty script reads as gas 0 with both climate sensors failed.
    pub fn new(script: Vec<SimReading>) -> Self {
        Self {
            script,
            cursor: 0,
        }
    }

    /// Calm air, a gas leak building to CRITICAL, then recovery.
    pub fn leak_episode() -> Self {
        let mut script = Vec::new();
        for gas in [120, 140, 160, 250, 340, 420, 560, 640, 610, 480, 330, 200, 130, 120] {
            script.push(SimReading::new(Some(24.0), Some(45.0), gas));
        }
        script.push(SimReading::new(None, Some(46.0), 118));
        Self::new(script)
    }

    /// Replace what the next reads return, starting over.
    pub fn set_script(&mut self, script: Vec<SimReading>) {
        self.script = script;
        self.cursor = 0;
    }

    /// Advance to the next scripted reading.  Called once per gas read,
    /// which the sample cycle performs last.
    fn advance(&mut self) {
        if self.script.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1) % self.script.len();
    }

    fn peek(&self) -> SimReading {
        self.script
            .get(self.cursor)
            .copied()
            .unwrap_or(SILENT)
    }
}

impl SensorPort for SimSensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.peek().temperature.ok_or(SensorError::ReadFailed)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        let h = self.peek().humidity.ok_or(SensorError::ReadFailed)?;
        if (0.0..=100.0).contains(&h) {
            Ok(h)
        } else {
            Err(SensorError::OutOfRange)
        }
    }

    fn read_gas(&mut self) -> u16 {
        let gas = self.peek().gas;
        self.advance();
        gas
    }
}
