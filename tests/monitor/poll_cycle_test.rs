// =============================================================================
// INTEGRATION TESTS - POLL CYCLE
// Probe → circuit refresh + retry → state machine → notification queue
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use onion_node_monitor::services::circuit::CircuitManager;
use onion_node_monitor::services::monitor::{MonitorEngine, OutageStateMachine, Transition};
use onion_node_monitor::services::node::NodeError;
use onion_node_monitor::services::notify::{notification_channel, Notification};
use onion_node_monitor::services::probe::{HealthProbe, ProbeOutcome};

use crate::common::{snapshot, CountingTransport, ScriptedNode};

const REFRESH_INTERVAL: Duration = Duration::from_secs(300);

fn engine(
    node: Arc<ScriptedNode>,
    transport: Arc<CountingTransport>,
    max_retries: u32,
) -> (MonitorEngine, mpsc::Receiver<Notification>) {
    let (tx, rx) = notification_channel(16);
    let engine = MonitorEngine::new(
        HealthProbe::new(node, Duration::from_secs(60)),
        CircuitManager::new(transport, REFRESH_INTERVAL),
        OutageStateMachine::new(max_retries),
        tx,
        Duration::from_secs(120),
    );
    (engine, rx)
}

#[tokio::test]
async fn test_transport_blip_recovered_by_retry_is_invisible() {
    let node = Arc::new(
        ScriptedNode::healthy("node").then(Err(NodeError::Transport("stream reset".into()))),
    );
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, mut rx) = engine(node.clone(), transport.clone(), 3);

    let report = engine.run_cycle().await;

    assert!(report.retried);
    assert!(report.outcome.is_success());
    assert_eq!(report.transition, Transition::None);
    assert_eq!(node.calls(), 2);
    assert_eq!(transport.refreshes(), 1);
    assert_eq!(engine.state().consecutive_failures, 0);
    assert!(engine.state().is_online);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_timeout_also_triggers_refresh_and_retry() {
    let node = Arc::new(ScriptedNode::healthy("node").then(Err(NodeError::Timeout)));
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, _rx) = engine(node.clone(), transport.clone(), 3);

    let report = engine.run_cycle().await;

    assert!(report.retried);
    assert_eq!(transport.refreshes(), 1);
    assert_eq!(engine.state().consecutive_failures, 0);
}

#[tokio::test]
async fn test_application_error_counts_without_refresh() {
    let node = Arc::new(ScriptedNode::with_fallback(Err(NodeError::Api { status: 500 })));
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, _rx) = engine(node.clone(), transport.clone(), 3);

    let report = engine.run_cycle().await;

    assert!(!report.retried);
    assert_eq!(report.outcome, ProbeOutcome::ApplicationError(500));
    assert_eq!(node.calls(), 1);
    assert_eq!(transport.refreshes(), 0);
    assert_eq!(engine.state().consecutive_failures, 1);
}

#[tokio::test]
async fn test_failed_retry_counts_once_per_cycle() {
    let node = Arc::new(ScriptedNode::unreachable());
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, _rx) = engine(node.clone(), transport.clone(), 3);

    engine.run_cycle().await;

    assert_eq!(node.calls(), 2);
    assert_eq!(engine.state().consecutive_failures, 1);
    assert!(engine.state().is_online);
}

#[tokio::test]
async fn test_outage_alert_once_then_single_recovery() {
    let node = Arc::new(ScriptedNode::unreachable());
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, mut rx) = engine(node.clone(), transport.clone(), 3);

    engine.run_cycle().await;
    engine.run_cycle().await;
    assert!(rx.try_recv().is_err());

    let third = engine.run_cycle().await;
    assert!(matches!(third.transition, Transition::WentOffline { consecutive_failures: 3, .. }));
    match rx.try_recv() {
        Ok(Notification::Offline { failed_attempts, last_success_at, .. }) => {
            assert_eq!(failed_attempts, 3);
            assert_eq!(last_success_at, None);
        }
        other => panic!("expected offline alert, got {:?}", other),
    }
    assert!(engine.state().alert_sent);
    assert!(!engine.state().is_online);

    // Still down: counted, not re-announced.
    engine.run_cycle().await;
    assert_eq!(engine.state().consecutive_failures, 4);
    assert!(rx.try_recv().is_err());

    node.set_fallback(Ok(snapshot("node")));
    let recovery = engine.run_cycle().await;
    assert!(matches!(recovery.transition, Transition::BackOnline { .. }));
    match rx.try_recv() {
        Ok(Notification::BackOnline { snapshot, .. }) => assert_eq!(snapshot.alias, "node"),
        other => panic!("expected recovery message, got {:?}", other),
    }
    assert_eq!(engine.state().consecutive_failures, 0);
    assert!(!engine.state().alert_sent);

    engine.run_cycle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_status_published_to_subscribers() {
    let node = Arc::new(ScriptedNode::with_fallback(Err(NodeError::Api { status: 401 })));
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, _rx) = engine(node, transport, 3);
    let status = engine.subscribe();

    assert_eq!(status.borrow().state.consecutive_failures, 0);
    engine.run_cycle().await;

    let published = status.borrow().clone();
    assert_eq!(published.state.consecutive_failures, 1);
    assert_eq!(published.max_retries, 3);
    assert!(published.state.last_check_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_refresh_during_success_streak() {
    let node = Arc::new(ScriptedNode::healthy("node"));
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, _rx) = engine(node.clone(), transport.clone(), 3);

    let first = engine.run_cycle().await;
    assert!(!first.scheduled_refresh);
    assert_eq!(transport.refreshes(), 0);

    tokio::time::advance(REFRESH_INTERVAL).await;
    let second = engine.run_cycle().await;

    assert!(second.scheduled_refresh);
    assert!(!second.retried);
    assert_eq!(transport.refreshes(), 1);
    assert_eq!(engine.state().consecutive_failures, 0);
    assert_eq!(engine.subscribe().borrow().circuit_refreshes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_and_failure_refresh_coalesce() {
    let node = Arc::new(
        ScriptedNode::healthy("node").then(Err(NodeError::Transport("proxy error".into()))),
    );
    let transport = Arc::new(CountingTransport::default());
    let (mut engine, _rx) = engine(node.clone(), transport.clone(), 3);

    tokio::time::advance(REFRESH_INTERVAL + Duration::from_secs(1)).await;
    let report = engine.run_cycle().await;

    assert!(report.scheduled_refresh);
    assert!(report.retried);
    assert!(report.outcome.is_success());
    assert_eq!(transport.refreshes(), 1);
    assert_eq!(node.calls(), 2);
}
