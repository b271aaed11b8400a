//! Port traits: the hexagonal boundary between the node cores and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SensingNode / SupervisoryNode (domain)
//! ```
//!
//! Driven adapters (transport, sensors, relay output, observers, clocks)
//! implement these traits.  The node services are generic over them, so
//! the domain core never touches a socket or a GPIO directly.
//!
//! Inbound traffic does not come back through these traits: transport
//! adapters post [`Event`](crate::events::Event)s into the node's queue.

use log::warn;

use crate::aggregator::StateView;
use crate::config::NodeConfig;
use crate::error::{ObserverError, SensorError, TransportError};
use crate::events::Task;
use crate::model::{AlertLevel, Millis, RelayState, SensorSample};

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ broker)
// ───────────────────────────────────────────────────────────────

/// Credentials presented during the transport handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl NodeIdentity {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            client_id: config.node_id.clone(),
            username: config.broker.username.clone(),
            password: config.broker.password.clone(),
        }
    }
}

/// How far a connect or subscribe request got before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The broker already acknowledged it.
    Complete,
    /// Sent; the acknowledgement arrives later as `Event::Ack`.
    Pending,
}

/// Publish/subscribe client.
///
/// Delivery is at-most-once.  Implementations report an asynchronous
/// connection drop by posting `Event::TransportLost` to the node's queue;
/// synchronous failures are returned from the call that hit them.  No
/// method may wait on the network.
pub trait TransportPort {
    /// Start the broker handshake.
    fn connect(&mut self, identity: &NodeIdentity) -> Result<Handshake, TransportError>;

    /// Request a subscription.
    fn subscribe(&mut self, topic: &str) -> Result<Handshake, TransportError>;

    /// Publish a payload, optionally retained by the broker.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError>;

    /// Tear down the session.  Safe to call when already disconnected.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the sensing node calls this every sample period.
pub trait SensorPort {
    fn read_temperature(&mut self) -> Result<f32, SensorError>;

    fn read_humidity(&mut self) -> Result<f32, SensorError>;

    /// Raw gas level.  Analog reads always yield a value.
    fn read_gas(&mut self) -> u16;

    /// Read every sensor into a sample.  Failed climate reads become
    /// absent fields instead of failing the cycle.
    fn read(&mut self, now: Millis) -> SensorSample {
        let temperature = self
            .read_temperature()
            .inspect_err(|e| warn!("SENSOR: temperature {e}"))
            .ok();
        let humidity = self
            .read_humidity()
            .inspect_err(|e| warn!("SENSOR: humidity {e}"))
            .ok();
        SensorSample::new(temperature, humidity, self.read_gas(), now)
    }
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the controlled output.  Only the interlock's
/// accepted transitions reach this port.
pub trait RelayPort {
    fn set_relay(&mut self, state: RelayState);
}

// ───────────────────────────────────────────────────────────────
// Observer port (supervisory → dashboards / notifications)
// ───────────────────────────────────────────────────────────────

/// Read-only consumer of aggregated state.
///
/// Implementations must return promptly (queue internally if the
/// downstream channel is slow).  Errors are logged and counted; they never
/// affect aggregation or relay commands.
pub trait ObserverPort {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn on_state_updated(&mut self, view: &StateView) -> Result<(), ObserverError>;

    fn on_alert(&mut self, level: AlertLevel, message: &str) -> Result<(), ObserverError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The node cores emit structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since the node started.
pub trait ClockPort {
    fn now_ms(&self) -> Millis;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the event queue)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a task is due.
///
/// The runtime implements this by posting to the node's
/// [`EventQueue`](crate::events::EventQueue); the scheduler itself knows
/// nothing about queues.
pub trait SchedulerDelegate {
    fn on_schedule_fired(&mut self, task: Task);
}
