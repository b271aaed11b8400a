//! Shared data model: samples, alert levels, relay state.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds on the owning node's monotonic clock.
pub type Millis = u64;

// ---------------------------------------------------------------------------
// Sensor sample
// ---------------------------------------------------------------------------

/// One reading of every environmental sensor.
///
/// Temperature and humidity are `None` when the sensor did not deliver a
/// usable value.  They are never replaced by a numeric sentinel, so an
/// absent reading cannot spuriously cross a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    /// Air temperature (°C).
    pub temperature: Option<f32>,
    /// Relative humidity (%).
    pub humidity: Option<f32>,
    /// Raw gas sensor level (ADC counts).
    pub gas_level: u16,
    /// Capture time on the sensing node's clock.
    pub captured_at: Millis,
}

impl SensorSample {
    /// Build a sample, demoting non-finite readings to absent.
    pub fn new(
        temperature: Option<f32>,
        humidity: Option<f32>,
        gas_level: u16,
        captured_at: Millis,
    ) -> Self {
        Self {
            temperature: temperature.filter(|t| t.is_finite()),
            humidity: humidity.filter(|h| h.is_finite()),
            gas_level,
            captured_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Alert level
// ---------------------------------------------------------------------------

/// Hazard severity, ordered `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Relay state
// ---------------------------------------------------------------------------

/// State of the controlled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    On,
    #[default]
    Off,
}

impl RelayState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
