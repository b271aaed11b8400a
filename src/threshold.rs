//! Threshold evaluator.
//!
//! Maps a single [`SensorSample`] to an [`AlertLevel`].  The mapping is a
//! pure function of the current sample: no smoothing, no hysteresis, no
//! history.  CRITICAL conditions are checked before WARNING.

use crate::config::Thresholds;
use crate::model::{AlertLevel, SensorSample};

/// Classify a sample against the configured thresholds.
pub fn classify(sample: &SensorSample, thresholds: &Thresholds) -> AlertLevel {
    let gas_critical = sample.gas_level > thresholds.gas_critical;
    let temp_critical = sample
        .temperature
        .is_some_and(|t| t > thresholds.temp_high_c);
    let humid_critical = sample
        .humidity
        .is_some_and(|h| h > thresholds.humid_high_pct);

    if gas_critical || temp_critical || humid_critical {
        AlertLevel::Critical
    } else if sample.gas_level > thresholds.gas_warning {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}
