//! Two-node simulation on one thread.
//!
//! Runs a sensing node and a supervisory node cooperatively on an
//! `edge-executor` over the in-process loopback broker, with a scripted
//! operator and one forced network drop.  Alert notifications also go to a
//! consumer thread through a bounded channel:
//!
//! ```text
//!  t=0s    both nodes connect; the sensing node replays a gas leak
//!  t=6s    gas crosses CRITICAL, relay latched OFF
//!  t=8s    operator sends RELAY_ON (lands while latched, rejected)
//!  t=12s   operator sends RELAY_ON again (latch cleared, accepted)
//!  t=16s   broker drops the sensing node; it reconnects with backoff
//!  t=21s   the leak profile repeats
//! ```
//!
//! Usage: `hazardlink-sim [seconds]` (default 30).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_io_mini::Timer;
use edge_executor::LocalExecutor;
use log::{info, warn};

use hazardlink::adapters::hardware::NodeHardware;
use hazardlink::adapters::log_observer::{ChannelObserver, LogObserver, Notification};
use hazardlink::adapters::log_sink::LogEventSink;
use hazardlink::adapters::loopback::LoopbackBroker;
use hazardlink::adapters::relay_pin::{Polarity, RelayPin, SimPin};
use hazardlink::adapters::sim_sensor::SimSensor;
use hazardlink::adapters::time::MonotonicClock;
use hazardlink::app::ports::{NodeIdentity, TransportPort};
use hazardlink::app::sensing::SensingNode;
use hazardlink::app::supervisory::SupervisoryNode;
use hazardlink::config::{BackoffPolicy, NodeConfig, Role};
use hazardlink::diagnostics;
use hazardlink::events::EventQueue;
use hazardlink::model::RelayState;
use hazardlink::protocol::{TopicKind, Topics, encode_control};
use hazardlink::runtime::run_node;

const SENSING_ID: &str = "sensing-01";
const SUPERVISORY_ID: &str = "hub-01";

enum Step {
    PressOn(&'static str),
    DropSensing,
}

/// Seconds from start, and what happens then.
const SCRIPT: [(u64, Step); 3] = [
    (8, Step::PressOn("during leak")),
    (12, Step::PressOn("after recovery")),
    (16, Step::DropSensing),
];

fn sim_config(role: Role, node_id: &str) -> Result<NodeConfig> {
    let config = NodeConfig {
        role,
        node_id: node_id.into(),
        peer_node: (role == Role::Supervisory).then(|| SENSING_ID.into()),
        backoff: BackoffPolicy::Exponential {
            min_ms: 500,
            max_ms: 4_000,
        },
        sample_interval_ms: 1_000,
        data_interval_ms: 2_000,
        status_interval_ms: 10_000,
        reconnect_check_ms: 250,
        dashboard_sync_ms: 2_000,
        staleness_ms: 6_000,
        alert_hold_ms: 3_000,
        ..NodeConfig::default()
    };
    config.validate().context("simulation config")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    diagnostics::install_panic_handler();

    let seconds: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().with_context(|| format!("bad duration '{arg}'"))?,
        None => 30,
    };

    let sensing_cfg = sim_config(Role::Sensing, SENSING_ID)?;
    let supervisory_cfg = sim_config(Role::Supervisory, SUPERVISORY_ID)?;
    let control_topic = Topics::new(&sensing_cfg.topic_prefix)
        .get(TopicKind::Control)
        .to_string();

    // Nothing reads the publish history here.
    let broker = LoopbackBroker::with_history(0);
    let clock = MonotonicClock::new();
    let shutdown = AtomicBool::new(false);

    let sensing_q = Arc::new(EventQueue::new());
    let relay_probe = SimPin::new();
    let mut sensing = SensingNode::new(
        &sensing_cfg,
        broker.transport(sensing_q.clone()),
        NodeHardware::new(
            SimSensor::leak_episode(),
            RelayPin::new(relay_probe.probe(), Polarity::ActiveHigh),
        ),
        LogEventSink::new(SENSING_ID),
    );

    let supervisory_q = Arc::new(EventQueue::new());
    let mut supervisory = SupervisoryNode::new(
        &supervisory_cfg,
        broker.transport(supervisory_q.clone()),
        LogEventSink::new(SUPERVISORY_ID),
    );
    supervisory.add_observer(Box::new(LogObserver::new("panel")));
    let (notifier, notifications) = ChannelObserver::new("notifier", 16);
    supervisory.add_observer(Box::new(notifier));
    let consumer = std::thread::Builder::new()
        .name("notifier".into())
        .spawn(move || {
            let mut delivered = 0u32;
            for n in notifications {
                if let Notification::Alert { level, message } = n {
                    info!("NOTIFY: {} | {}", level, message);
                    delivered += 1;
                }
            }
            delivered
        })
        .context("spawn notifier thread")?;

    let mut operator = broker.transport(Arc::new(EventQueue::new()));
    operator
        .connect(&NodeIdentity {
            client_id: "operator".into(),
            username: None,
            password: None,
        })
        .map_err(|e| anyhow::anyhow!("operator connect: {e}"))?;

    info!("SIM: running for {}s", seconds);
    {
        let executor: LocalExecutor<'_, 8> = LocalExecutor::new();
        executor
            .spawn(run_node(&mut sensing, &sensing_q, &clock, &shutdown))
            .detach();
        executor
            .spawn(run_node(&mut supervisory, &supervisory_q, &clock, &shutdown))
            .detach();

        let scenario = async {
            let mut elapsed = 0;
            for (at, step) in SCRIPT {
                if at >= seconds {
                    break;
                }
                Timer::after(Duration::from_secs(at - elapsed)).await;
                elapsed = at;
                match step {
                    Step::PressOn(label) => {
                        info!("SIM: operator presses ON ({})", label);
                        let payload = encode_control(RelayState::On).as_bytes();
                        if let Err(e) = operator.publish(&control_topic, payload, false) {
                            warn!("SIM: operator publish failed: {}", e);
                        }
                    }
                    Step::DropSensing => {
                        broker.drop_client(SENSING_ID);
                    }
                }
            }
            Timer::after(Duration::from_secs(seconds - elapsed)).await;
            shutdown.store(true, Ordering::Relaxed);
            // Let both loops observe the flag.
            Timer::after(Duration::from_millis(300)).await;
        };

        futures_lite::future::block_on(executor.run(scenario));
    }

    info!(
        "SIM: done. relay pin {} | sensing {} | supervisory {}",
        if relay_probe.is_high() { "HIGH" } else { "LOW" },
        sensing.diagnostics().snapshot(seconds).to_json(),
        supervisory.diagnostics().snapshot(seconds).to_json(),
    );

    // Dropping the node closes the channel and ends the consumer.
    drop(supervisory);
    let delivered = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("notifier thread panicked"))?;
    info!("SIM: {} alert notifications delivered", delivered);
    Ok(())
}
