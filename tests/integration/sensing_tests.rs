//! Integration tests for the sensing pipeline:
//! sensors → classify → interlock → relay output → publishes.

use hazardlink::adapters::log_sink::RecordingSink;
use hazardlink::app::commands::CommandOrigin;
use hazardlink::app::events::AppEvent;
use hazardlink::app::sensing::SensingNode;
use hazardlink::config::Role;
use hazardlink::diagnostics::NodeDiagnostics;
use hazardlink::error::MalformedMessage;
use hazardlink::model::{AlertLevel, RelayState};
use hazardlink::protocol::Message;
use hazardlink::runtime::NodeCore;

use crate::mocks::{MockHardware, MockTransport, Reading, reading, test_config, topic};

type Node = SensingNode<MockTransport, MockHardware, RecordingSink>;

/// Started and connected at t=0, nothing published yet.
fn make_node() -> Node {
    let mut node = SensingNode::new(
        &test_config(Role::Sensing),
        MockTransport::new(),
        MockHardware::new(),
        RecordingSink::new(),
    );
    node.start(0);
    node.reconnect_check(0);
    assert!(node.link().is_connected());
    node.link_mut().transport_mut().published.clear();
    node
}

fn transport(node: &Node) -> &MockTransport {
    node.link().transport()
}

fn control(node: &mut Node, payload: &[u8], now: u64) {
    let t = topic("control");
    node.on_control(&t, payload, now);
}

/// Turn the relay on through the control path.
fn switch_on(node: &mut Node, now: u64) {
    control(node, b"RELAY_ON", now);
    assert_eq!(node.relay_state(), RelayState::On);
    node.link_mut().transport_mut().published.clear();
}

// ── Startup ──────────────────────────────────────────────────

#[test]
fn start_drives_relay_off_and_subscribes_control() {
    let node = make_node();
    assert_eq!(node.relay_state(), RelayState::Off);
    assert_eq!(node.hardware().relay_calls, vec![RelayState::Off]);
    assert_eq!(transport(&node).subscriptions, vec![topic("control")]);
    assert_eq!(
        node.sink()
            .count(|e| matches!(e, AppEvent::Started(Role::Sensing))),
        1
    );
}

#[test]
fn first_session_publishes_retained_status() {
    let mut node = SensingNode::new(
        &test_config(Role::Sensing),
        MockTransport::new(),
        MockHardware::new(),
        RecordingSink::new(),
    );
    node.start(0);
    node.reconnect_check(0);

    let status = transport(&node).published_on("status");
    assert_eq!(status.len(), 1);
    assert!(status[0].retain);
    assert_eq!(transport(&node).status_relays(), vec![RelayState::Off]);
}

// ── Local safety ─────────────────────────────────────────────

#[test]
fn critical_latches_relay_off_and_publishes_status_and_alert() {
    let mut node = make_node();
    switch_on(&mut node, 10);

    node.hardware_mut().set_gas(650);
    node.sample_cycle(100);

    assert_eq!(node.relay_state(), RelayState::Off);
    assert!(node.interlock().is_latched());
    assert_eq!(node.hardware().relay(), Some(RelayState::Off));
    assert_eq!(node.interlock().last_origin(), Some(CommandOrigin::LocalSafety));

    let t = transport(&node);
    assert_eq!(t.status_relays(), vec![RelayState::Off]);
    assert!(t.published_on("status").iter().all(|p| p.retain));
    assert_eq!(t.alert_levels(), vec![AlertLevel::Critical]);
    assert!(t.published_on("alert").iter().all(|p| !p.retain));

    // The relay moves before anything leaves the node.
    let events = &node.sink().events;
    let relay_at = events
        .iter()
        .position(|e| matches!(e, AppEvent::RelayChanged(t) if t.to == RelayState::Off))
        .expect("relay change emitted");
    let alert_at = events
        .iter()
        .position(|e| *e == AppEvent::AlertRaised(AlertLevel::Critical))
        .expect("alert emitted");
    assert!(relay_at < alert_at);
}

#[test]
fn repeated_critical_alerts_every_cycle_but_status_once() {
    let mut node = make_node();
    switch_on(&mut node, 10);
    node.hardware_mut().set_gas(700);

    for i in 1..=3 {
        node.sample_cycle(i * 100);
    }

    let t = transport(&node);
    assert_eq!(t.alert_levels(), vec![AlertLevel::Critical; 3]);
    assert_eq!(t.status_relays(), vec![RelayState::Off]);
    assert_eq!(
        node.hardware().relay_calls,
        vec![RelayState::Off, RelayState::On, RelayState::Off]
    );
}

#[test]
fn normal_cycle_publishes_nothing() {
    let mut node = make_node();
    node.hardware_mut().set_gas(120);
    node.sample_cycle(100);

    assert!(transport(&node).published.is_empty());
    assert_eq!(node.sink().count(|e| matches!(e, AppEvent::AlertRaised(_))), 0);
}

#[test]
fn warning_alerts_without_touching_relay() {
    let mut node = make_node();
    switch_on(&mut node, 10);
    node.hardware_mut().set_gas(350);
    node.sample_cycle(100);

    assert_eq!(node.relay_state(), RelayState::On);
    assert_eq!(transport(&node).alert_levels(), vec![AlertLevel::Warning]);
    assert!(transport(&node).published_on("status").is_empty());
}

#[test]
fn absent_temperature_is_not_critical_and_travels_as_null() {
    let mut node = make_node();
    node.hardware_mut().set(Reading {
        temperature: None,
        humidity: Some(45.0),
        gas: 100,
    });
    node.sample_cycle(100);
    node.publish_data(150);

    assert_eq!(node.relay_state(), RelayState::Off);
    assert!(!node.interlock().is_latched());

    let data = transport(&node).published_on("data");
    assert_eq!(data.len(), 1);
    let json: serde_json::Value = serde_json::from_slice(&data[0].payload).unwrap();
    assert!(json["temperature"].is_null());
    assert_eq!(json["gas"], 100);

    match Message::decode(&data[0].payload).unwrap() {
        Message::Data(m) => {
            assert_eq!(m.temperature, None);
            assert_eq!(m.humidity, Some(45.0));
            assert_eq!(m.node, "sensing-t");
        }
        other => panic!("expected data, got {other:?}"),
    }
}

#[test]
fn data_publish_before_first_sample_is_skipped() {
    let mut node = make_node();
    node.publish_data(10);
    assert!(transport(&node).published.is_empty());
}

// ── Remote commands ──────────────────────────────────────────

#[test]
fn remote_on_while_latched_is_rejected() {
    let mut node = make_node();
    node.hardware_mut().set_gas(900);
    node.sample_cycle(100);
    node.link_mut().transport_mut().published.clear();

    control(&mut node, b"RELAY_ON", 150);

    assert_eq!(node.relay_state(), RelayState::Off);
    assert_eq!(node.diagnostics().rejected_commands, 1);
    assert_eq!(
        node.sink().count(|e| *e
            == AppEvent::CommandRejected {
                action: RelayState::On
            }),
        1
    );
    // No status: nothing changed.
    assert!(transport(&node).published_on("status").is_empty());
}

#[test]
fn latch_clears_on_warning_and_later_on_is_accepted() {
    let mut node = make_node();
    node.hardware_mut().set_gas(900);
    node.sample_cycle(100);

    node.hardware_mut().set_gas(350);
    node.sample_cycle(200);
    assert!(!node.interlock().is_latched());
    // Clearing the latch does not switch anything back on.
    assert_eq!(node.relay_state(), RelayState::Off);

    node.link_mut().transport_mut().published.clear();
    control(&mut node, b"RELAY_ON", 250);

    assert_eq!(node.relay_state(), RelayState::On);
    assert_eq!(node.hardware().relay(), Some(RelayState::On));
    assert_eq!(node.interlock().last_origin(), Some(CommandOrigin::Remote));
    assert_eq!(transport(&node).status_relays(), vec![RelayState::On]);
}

#[test]
fn remote_off_is_accepted_while_latched() {
    let mut node = make_node();
    node.hardware_mut().set_gas(900);
    node.sample_cycle(100);
    node.link_mut().transport_mut().published.clear();

    control(&mut node, b"RELAY_OFF", 150);

    // Already off: no transition, no status, no rejection.
    assert_eq!(node.relay_state(), RelayState::Off);
    assert_eq!(node.diagnostics().rejected_commands, 0);
    assert!(transport(&node).published_on("status").is_empty());
}

#[test]
fn duplicate_on_emits_one_status() {
    let mut node = make_node();
    control(&mut node, b"RELAY_ON", 10);
    control(&mut node, b"RELAY_ON", 20);

    assert_eq!(transport(&node).status_relays(), vec![RelayState::On]);
    assert_eq!(node.hardware().relay_calls, vec![RelayState::Off, RelayState::On]);
}

#[test]
fn malformed_control_is_counted_and_ignored() {
    let mut node = make_node();

    control(&mut node, b"relay_on", 10);
    control(&mut node, b"{\"cmd\":\"on\"}", 20);
    node.on_control(&topic("data"), b"RELAY_ON", 30);

    assert_eq!(node.relay_state(), RelayState::Off);
    assert_eq!(node.diagnostics().malformed_messages, 3);
    assert_eq!(
        node.sink().count(|e| *e
            == AppEvent::MalformedMessage(MalformedMessage::UnknownCommand)),
        2
    );
    assert_eq!(
        node.sink()
            .count(|e| *e == AppEvent::MalformedMessage(MalformedMessage::UnknownTopic)),
        1
    );
    assert!(transport(&node).published.is_empty());
}

// ── Offline behaviour ────────────────────────────────────────

#[test]
fn offline_critical_still_switches_off_and_counts_drops() {
    let mut node = make_node();
    switch_on(&mut node, 10);
    node.link_mut().lost(20, &mut RecordingSink::new());
    assert!(!node.link().is_connected());

    node.hardware_mut().set_gas(800);
    node.sample_cycle(100);

    assert_eq!(node.relay_state(), RelayState::Off);
    assert_eq!(node.hardware().relay(), Some(RelayState::Off));
    assert!(transport(&node).published.is_empty());
    // Status and alert were both dropped.
    assert_eq!(node.diagnostics().dropped_publishes, 2);
}

#[test]
fn reconnect_republishes_current_status() {
    let mut node = make_node();
    switch_on(&mut node, 10);
    node.hardware_mut().set_gas(800);
    node.link_mut().lost(20, &mut RecordingSink::new());
    node.sample_cycle(100);

    // Default backoff starts at 1s.
    node.reconnect_check(500);
    assert!(!node.link().is_connected());
    node.reconnect_check(1_020);
    assert!(node.link().is_connected());

    let t = transport(&node);
    assert_eq!(t.status_relays(), vec![RelayState::Off]);
    assert!(t.published_on("status")[0].retain);
    assert_eq!(t.subscriptions, vec![topic("control"), topic("control")]);
}

#[test]
fn publish_failure_drops_the_session() {
    let mut node = make_node();
    node.link_mut().transport_mut().fail_publishes = 1;
    node.hardware_mut().set_gas(400);
    node.sample_cycle(100);

    assert!(!node.link().is_connected());
    assert_eq!(transport(&node).disconnects, 1);
    let diag: NodeDiagnostics = node.diagnostics();
    assert_eq!(diag.publish_failures, 1);
    assert!(node.sink().events.iter().any(|e| matches!(
        e,
        AppEvent::ConnectionChanged { to, .. } if *to == hazardlink::connection::ConnectionState::Disconnected
    )));
}

#[test]
fn handle_routes_queue_events() {
    use hazardlink::events::{Event, Task};

    let mut node = make_node();
    node.hardware_mut().queued.extend([reading(100), reading(900)]);

    node.handle(Event::Scheduled(Task::Sample), 100);
    node.handle(Event::Scheduled(Task::Sample), 200);
    assert!(node.interlock().is_latched());

    let inbound = Event::inbound(&topic("control"), b"RELAY_ON").unwrap();
    node.handle(inbound, 250);
    assert_eq!(node.diagnostics().rejected_commands, 1);

    node.handle(Event::TransportLost, 300);
    assert!(!node.link().is_connected());
    // A second loss report does not push the retry out further.
    let retry_at = node.link().connection().retry_at();
    node.handle(Event::TransportLost, 400);
    assert_eq!(node.link().connection().retry_at(), retry_at);
}
