//! HazardLink node agent.
//!
//! Runs one node, sensing or supervisory, against an MQTT broker.  The
//! role and everything else come from the JSON config file named by the
//! first argument; without one the defaults are used.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MqttTransport   NodeHardware      LogEventSink   LogObserver  │
//! │  (Transport)     (Sensor+Relay)    (EventSink)    (Observer)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        SensingNode  |  SupervisoryNode (pure logic)    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler ──▶ EventQueue ◀── MQTT I/O thread                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On a host there is no sensor hardware, so the sensing role reads the
//! simulated leak profile and drives an in-memory relay pin.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use log::{info, warn};

use hazardlink::adapters::hardware::NodeHardware;
use hazardlink::adapters::log_observer::LogObserver;
use hazardlink::adapters::log_sink::LogEventSink;
use hazardlink::adapters::mqtt::MqttTransport;
use hazardlink::adapters::relay_pin::{Polarity, RelayPin, SimPin};
use hazardlink::adapters::sim_sensor::SimSensor;
use hazardlink::adapters::time::MonotonicClock;
use hazardlink::app::sensing::SensingNode;
use hazardlink::app::supervisory::SupervisoryNode;
use hazardlink::config::{NodeConfig, Role};
use hazardlink::diagnostics;
use hazardlink::events::EventQueue;
use hazardlink::runtime::run_node;

fn load_config() -> Result<NodeConfig> {
    let Some(path) = std::env::args().nth(1) else {
        warn!("No config file given, using defaults");
        return Ok(NodeConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = NodeConfig::from_json(&text).with_context(|| format!("loading {path}"))?;
    info!("Config loaded from {}", path);
    Ok(config)
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    diagnostics::install_panic_handler();

    info!("╔══════════════════════════════════════╗");
    info!("║  HazardLink v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config()?;
    info!(
        "Node '{}' role={:?} broker={}:{} prefix='{}'",
        config.node_id, config.role, config.broker.host, config.broker.port, config.topic_prefix
    );

    // ── 3. Shared runtime pieces ──────────────────────────────
    let queue = Arc::new(EventQueue::new());
    let transport = MqttTransport::new(config.broker.clone(), queue.clone());
    let clock = MonotonicClock::new();
    let shutdown = AtomicBool::new(false);
    let sink = LogEventSink::new(&config.node_id);

    // ── 4. Run the node for this role ─────────────────────────
    match config.role {
        Role::Sensing => {
            let hw = NodeHardware::new(
                SimSensor::leak_episode(),
                RelayPin::new(SimPin::new(), Polarity::ActiveHigh),
            );
            let mut node = SensingNode::new(&config, transport, hw, sink);
            futures_lite::future::block_on(run_node(&mut node, &queue, &clock, &shutdown));
        }
        Role::Supervisory => {
            let mut node = SupervisoryNode::new(&config, transport, sink);
            node.add_observer(Box::new(LogObserver::new("console")));
            futures_lite::future::block_on(run_node(&mut node, &queue, &clock, &shutdown));
        }
    }

    Ok(())
}
