//! Node configuration parameters
//!
//! All tunable parameters for both node roles.  Loaded from a JSON file by
//! the agent binary; every field has a default so a partial file is valid.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the link this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reads sensors, owns the relay.
    Sensing,
    /// Mirrors state, notifies observers, issues safety commands.
    Supervisory,
}

/// Classification thresholds.  A reading must be strictly above a threshold
/// to trip it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Gas level (ADC counts) above which the level is at least WARNING.
    pub gas_warning: u16,
    /// Gas level (ADC counts) above which the level is CRITICAL.
    pub gas_critical: u16,
    /// Temperature (°C) above which the level is CRITICAL.
    pub temp_high_c: f32,
    /// Relative humidity (%) above which the level is CRITICAL.
    pub humid_high_pct: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            gas_warning: 300,
            gas_critical: 500,
            temp_high_c: 40.0,
            humid_high_pct: 80.0,
        }
    }
}

/// Delay policy between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// `min_ms`, doubled after every failure, capped at `max_ms`.
    Exponential { min_ms: u64, max_ms: u64 },
    /// Always wait `delay_ms`.
    Fixed { delay_ms: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            min_ms: 1_000,
            max_ms: 30_000,
        }
    }
}

/// Broker endpoint and node credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// How long to wait for CONNACK / SUBACK before giving up.
    pub ack_timeout_ms: u64,
    pub keep_alive_secs: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            username: None,
            password: None,
            ack_timeout_ms: 5_000,
            keep_alive_secs: 30,
        }
    }
}

/// Complete configuration for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Identity ---
    pub role: Role,
    /// This node's identity; also the MQTT client id.
    pub node_id: String,
    /// Supervisory only: accept messages from this sensing node alone.
    pub peer_node: Option<String>,
    /// Topics are `<prefix>/data`, `<prefix>/alert`, `<prefix>/status`,
    /// `<prefix>/control`.
    pub topic_prefix: String,

    // --- Transport ---
    pub broker: BrokerConfig,
    pub backoff: BackoffPolicy,

    // --- Classification ---
    pub thresholds: Thresholds,

    // --- Timing (milliseconds) ---
    /// Sensing: read + classify period.
    pub sample_interval_ms: u64,
    /// Sensing: data publish period.
    pub data_interval_ms: u64,
    /// Sensing: retained status refresh period.
    pub status_interval_ms: u64,
    /// Both: how often the connection manager is polled.
    pub reconnect_check_ms: u64,
    /// Supervisory: observer refresh period.
    pub dashboard_sync_ms: u64,
    /// Supervisory: mirrored state older than this is stale.
    pub staleness_ms: u64,
    /// Supervisory: an alert not refreshed for this long decays to NORMAL.
    pub alert_hold_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Role::Sensing,
            node_id: "sensing-01".into(),
            peer_node: None,
            topic_prefix: "hazardlink/site1".into(),

            broker: BrokerConfig::default(),
            backoff: BackoffPolicy::default(),

            thresholds: Thresholds::default(),

            sample_interval_ms: 2_000,  // 0.5 Hz
            data_interval_ms: 5_000,
            status_interval_ms: 30_000,
            reconnect_check_ms: 500,
            dashboard_sync_ms: 2_000,
            staleness_ms: 15_000,
            alert_hold_ms: 10_000,
        }
    }
}

/// Errors from loading or validating a [`NodeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Parse(String),
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Parse(_) => Self::Config("unparseable configuration"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}

impl NodeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(format!("{e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values rather than clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.is_empty() || self.node_id.len() > 32 {
            return Err(ConfigError::ValidationFailed("node_id must be 1-32 bytes"));
        }
        if self.topic_prefix.is_empty() || self.topic_prefix.len() > 48 {
            return Err(ConfigError::ValidationFailed("topic_prefix must be 1-48 bytes"));
        }
        if self.topic_prefix.ends_with('/') || self.topic_prefix.contains(['+', '#']) {
            return Err(ConfigError::ValidationFailed(
                "topic_prefix must not end in '/' or contain wildcards",
            ));
        }

        if self.broker.host.is_empty() {
            return Err(ConfigError::ValidationFailed("broker.host must not be empty"));
        }
        if self.broker.keep_alive_secs < 5 {
            return Err(ConfigError::ValidationFailed("broker.keep_alive_secs must be >= 5"));
        }
        if self.broker.ack_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("broker.ack_timeout_ms must be > 0"));
        }

        let t = &self.thresholds;
        if t.gas_warning >= t.gas_critical {
            return Err(ConfigError::ValidationFailed("gas_warning must be below gas_critical"));
        }
        if !t.temp_high_c.is_finite() || !t.humid_high_pct.is_finite() {
            return Err(ConfigError::ValidationFailed("thresholds must be finite"));
        }
        if !(0.0..=100.0).contains(&t.humid_high_pct) {
            return Err(ConfigError::ValidationFailed("humid_high_pct must be 0-100"));
        }

        match self.backoff {
            BackoffPolicy::Exponential { min_ms, max_ms } => {
                if min_ms == 0 || min_ms > max_ms {
                    return Err(ConfigError::ValidationFailed(
                        "backoff requires 0 < min_ms <= max_ms",
                    ));
                }
            }
            BackoffPolicy::Fixed { delay_ms } => {
                if delay_ms == 0 {
                    return Err(ConfigError::ValidationFailed("backoff delay_ms must be > 0"));
                }
            }
        }

        let intervals = [
            self.sample_interval_ms,
            self.data_interval_ms,
            self.status_interval_ms,
            self.reconnect_check_ms,
            self.dashboard_sync_ms,
        ];
        if intervals.contains(&0) {
            return Err(ConfigError::ValidationFailed("task intervals must be > 0"));
        }
        if self.staleness_ms <= self.data_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "staleness_ms must exceed data_interval_ms",
            ));
        }
        if self.alert_hold_ms <= self.sample_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "alert_hold_ms must exceed sample_interval_ms",
            ));
        }
        Ok(())
    }
}
