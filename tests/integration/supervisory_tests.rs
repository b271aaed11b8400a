//! Integration tests for the supervisory pipeline:
//! inbound messages → aggregator → dispatcher → observers / control.

use hazardlink::adapters::log_sink::RecordingSink;
use hazardlink::app::events::AppEvent;
use hazardlink::app::supervisory::SupervisoryNode;
use hazardlink::config::Role;
use hazardlink::error::{MalformedMessage, ObserverError};
use hazardlink::model::{AlertLevel, RelayState, SensorSample};
use hazardlink::protocol::Message;
use hazardlink::runtime::NodeCore;

use crate::mocks::{
    CallLog, MockObserver, MockTransport, ObserverCall, SENSING_ID, alerts, last_state,
    test_config, topic,
};

type Node = SupervisoryNode<MockTransport, RecordingSink>;

fn make_node() -> (Node, CallLog) {
    let mut node = SupervisoryNode::new(
        &test_config(Role::Supervisory),
        MockTransport::new(),
        RecordingSink::new(),
    );
    let (observer, log) = MockObserver::new("panel");
    node.add_observer(Box::new(observer));
    node.start(0);
    node.reconnect_check(0);
    assert!(node.link().is_connected());
    (node, log)
}

fn transport(node: &Node) -> &MockTransport {
    node.link().transport()
}

fn encode(msg: &Message) -> Vec<u8> {
    msg.encode().unwrap()
}

fn send_alert(node: &mut Node, level: AlertLevel, now: u64) {
    let payload = encode(&Message::alert(SENSING_ID, level, now));
    node.on_message(&topic("alert"), &payload, now);
}

fn send_data(node: &mut Node, gas: u16, now: u64) {
    let sample = SensorSample::new(Some(24.0), Some(50.0), gas, now);
    let payload = encode(&Message::data(SENSING_ID, &sample));
    node.on_message(&topic("data"), &payload, now);
}

fn send_status(node: &mut Node, relay: RelayState, now: u64) {
    let payload = encode(&Message::status(SENSING_ID, relay, now / 1_000));
    node.on_message(&topic("status"), &payload, now);
}

// ── Startup ──────────────────────────────────────────────────

#[test]
fn subscribes_to_every_sensing_topic() {
    let (node, _) = make_node();
    assert_eq!(
        transport(&node).subscriptions,
        vec![topic("data"), topic("alert"), topic("status")]
    );
    assert!(node.link().connection().is_fully_subscribed());
    // Supervisory nodes never publish on their own at connect.
    assert!(transport(&node).published.is_empty());
}

// ── Alert dispatch ───────────────────────────────────────────

#[test]
fn critical_sends_relay_off_and_alerts_observers_once() {
    let (mut node, log) = make_node();

    send_alert(&mut node, AlertLevel::Critical, 100);
    send_alert(&mut node, AlertLevel::Critical, 200);
    send_alert(&mut node, AlertLevel::Critical, 300);

    let t = transport(&node);
    assert_eq!(t.control_payloads(), vec!["RELAY_OFF".to_string()]);
    assert!(t.published_on("control").iter().all(|p| !p.retain));
    assert_eq!(alerts(&log), vec![AlertLevel::Critical]);
    assert_eq!(node.view(300).state.last_alert, AlertLevel::Critical);
    assert_eq!(
        node.sink()
            .count(|e| *e == AppEvent::RelayCommandSent(RelayState::Off)),
        1
    );

    let message = log.borrow().iter().find_map(|c| match c {
        ObserverCall::Alert(_, m) => Some(m.clone()),
        ObserverCall::State(_) => None,
    });
    assert!(message.unwrap().contains(SENSING_ID));
}

#[test]
fn warning_notifies_without_command() {
    let (mut node, log) = make_node();
    send_alert(&mut node, AlertLevel::Warning, 100);

    assert!(transport(&node).control_payloads().is_empty());
    assert_eq!(alerts(&log), vec![AlertLevel::Warning]);
    assert_eq!(
        node.sink().count(|e| *e
            == AppEvent::AlertTransition {
                from: AlertLevel::Normal,
                to: AlertLevel::Warning
            }),
        1
    );
}

#[test]
fn escalation_from_warning_to_critical_dispatches_again() {
    let (mut node, log) = make_node();
    send_alert(&mut node, AlertLevel::Warning, 100);
    send_alert(&mut node, AlertLevel::Critical, 200);

    assert_eq!(alerts(&log), vec![AlertLevel::Warning, AlertLevel::Critical]);
    assert_eq!(transport(&node).control_payloads(), vec!["RELAY_OFF".to_string()]);
}

#[test]
fn alert_decays_and_a_new_critical_dispatches_again() {
    let (mut node, log) = make_node();
    send_alert(&mut node, AlertLevel::Critical, 100);

    // Hold time is 500ms.
    node.dashboard_sync(400);
    assert_eq!(node.view(400).state.last_alert, AlertLevel::Critical);
    node.dashboard_sync(700);
    assert_eq!(node.view(700).state.last_alert, AlertLevel::Normal);

    send_alert(&mut node, AlertLevel::Critical, 800);

    assert_eq!(
        transport(&node).control_payloads(),
        vec!["RELAY_OFF".to_string(), "RELAY_OFF".to_string()]
    );
    assert_eq!(alerts(&log), vec![AlertLevel::Critical, AlertLevel::Critical]);
    assert_eq!(
        node.sink().count(|e| *e
            == AppEvent::AlertTransition {
                from: AlertLevel::Critical,
                to: AlertLevel::Normal
            }),
        1
    );
}

#[test]
fn failing_observer_does_not_block_command_or_others() {
    let mut node: Node = SupervisoryNode::new(
        &test_config(Role::Supervisory),
        MockTransport::new(),
        RecordingSink::new(),
    );
    let (broken, broken_log) = MockObserver::failing("sms");
    let (healthy, healthy_log) = MockObserver::new("panel");
    node.add_observer(Box::new(broken));
    node.add_observer(Box::new(healthy));
    node.start(0);
    node.reconnect_check(0);

    send_alert(&mut node, AlertLevel::Critical, 100);

    assert_eq!(alerts(&broken_log), vec![AlertLevel::Critical]);
    assert_eq!(alerts(&healthy_log), vec![AlertLevel::Critical]);
    assert_eq!(transport(&node).control_payloads(), vec!["RELAY_OFF".to_string()]);
    assert_eq!(node.diagnostics().observer_failures, 1);
    assert_eq!(
        node.sink().count(|e| *e
            == AppEvent::ObserverFailed {
                observer: "sms".into(),
                error: ObserverError::Refused("channel down".into()),
            }),
        1
    );
    assert_eq!(node.view(100).state.last_alert, AlertLevel::Critical);
}

// ── Mirror ───────────────────────────────────────────────────

#[test]
fn status_mirrors_relay_and_pushes_state() {
    let (mut node, log) = make_node();
    send_status(&mut node, RelayState::On, 100);

    assert_eq!(node.view(100).state.last_relay, RelayState::On);
    let pushed = last_state(&log).expect("state pushed on relay change");
    assert_eq!(pushed.state.last_relay, RelayState::On);

    let calls = log.borrow().len();
    send_status(&mut node, RelayState::On, 200);
    assert_eq!(log.borrow().len(), calls, "unchanged relay pushes nothing");

    send_status(&mut node, RelayState::Off, 300);
    assert_eq!(last_state(&log).unwrap().state.last_relay, RelayState::Off);
}

#[test]
fn data_updates_last_sample() {
    let (mut node, _) = make_node();
    send_data(&mut node, 321, 150);

    let view = node.view(250);
    let sample = view.state.last_sample.expect("sample mirrored");
    assert_eq!(sample.gas_level, 321);
    assert_eq!(sample.captured_at, 150);
    assert_eq!(view.age_ms, Some(100));
    assert!(!view.stale);
}

#[test]
fn malformed_message_leaves_state_and_counts() {
    let (mut node, _) = make_node();
    send_data(&mut node, 200, 100);
    send_status(&mut node, RelayState::On, 100);
    let before = node.view(100).state;

    node.on_message(&topic("data"), b"{not json", 200);
    node.on_message(&topic("alert"), br#"{"type":"alert","node":"sensing-t","level":"PANIC","timestamp":1}"#, 210);
    let stray = encode(&Message::alert("sensing-other", AlertLevel::Critical, 5));
    node.on_message(&topic("alert"), &stray, 220);
    let wrong = encode(&Message::status(SENSING_ID, RelayState::Off, 1));
    node.on_message(&topic("data"), &wrong, 230);

    assert_eq!(node.view(230).state, before);
    assert_eq!(node.diagnostics().malformed_messages, 4);
    assert_eq!(node.aggregator().malformed_count(), 4);
    assert!(transport(&node).control_payloads().is_empty());
    assert_eq!(
        node.sink().count(|e| *e
            == AppEvent::MalformedMessage(MalformedMessage::UnexpectedNode)),
        1
    );
    assert_eq!(
        node.sink()
            .count(|e| *e == AppEvent::MalformedMessage(MalformedMessage::TopicMismatch)),
        1
    );
}

#[test]
fn staleness_edges_are_reported_once() {
    let (mut node, log) = make_node();
    let stale_events = |n: &Node| n.sink().count(|e| matches!(e, AppEvent::MirrorStale { .. }));
    let fresh_events = |n: &Node| n.sink().count(|e| *e == AppEvent::MirrorFresh);

    // Never updated counts as stale.
    node.dashboard_sync(50);
    node.dashboard_sync(100);
    assert_eq!(stale_events(&node), 1);
    assert!(node.sink().events.contains(&AppEvent::MirrorStale { age_ms: None }));

    send_data(&mut node, 100, 150);
    node.dashboard_sync(200);
    node.dashboard_sync(400);
    assert_eq!(fresh_events(&node), 1);
    assert!(!last_state(&log).unwrap().stale);

    // Staleness bound is 1000ms.
    node.dashboard_sync(1_150);
    assert_eq!(stale_events(&node), 1);
    node.dashboard_sync(1_151);
    assert_eq!(stale_events(&node), 2);
    assert!(
        node.sink()
            .events
            .contains(&AppEvent::MirrorStale { age_ms: Some(1_001) })
    );
    let view = last_state(&log).unwrap();
    assert!(view.stale);
    assert_eq!(view.state.last_sample.map(|s| s.gas_level), Some(100));
}

#[test]
fn any_accepted_message_refreshes_freshness() {
    let (mut node, _) = make_node();
    send_data(&mut node, 100, 0);
    send_status(&mut node, RelayState::Off, 900);
    assert!(!node.view(1_500).stale);
}

// ── Operator commands ────────────────────────────────────────

#[test]
fn operator_command_is_published_when_connected() {
    let (mut node, _) = make_node();
    assert!(node.command_relay(RelayState::On, 100));
    assert_eq!(transport(&node).control_payloads(), vec!["RELAY_ON".to_string()]);
}

#[test]
fn command_relay_reports_failure_while_offline() {
    let (mut node, _) = make_node();
    node.link_mut().lost(50, &mut RecordingSink::new());

    assert!(!node.command_relay(RelayState::On, 100));
    assert!(transport(&node).control_payloads().is_empty());
    assert_eq!(node.diagnostics().dropped_publishes, 1);
    assert_eq!(node.sink().count(|e| matches!(e, AppEvent::RelayCommandSent(_))), 0);
}

#[test]
fn critical_while_offline_still_notifies_observers() {
    let (mut node, log) = make_node();
    node.link_mut().lost(50, &mut RecordingSink::new());

    send_alert(&mut node, AlertLevel::Critical, 100);

    assert_eq!(alerts(&log), vec![AlertLevel::Critical]);
    assert_eq!(node.diagnostics().dropped_publishes, 1);
    assert_eq!(node.view(100).state.last_alert, AlertLevel::Critical);
}
