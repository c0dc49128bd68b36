// =============================================================================
// INTEGRATION TESTS - SUPERVISOR LIFECYCLE
// Startup message, concurrent loops, graceful shutdown
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use onion_node_monitor::services::notify::RetryConfig;
use onion_node_monitor::services::supervisor::{Collaborators, Supervisor};

use crate::common::{message, test_config, CountingTransport, QueuedUpdates, RecordingNotifier, ScriptedNode, OPERATOR_CHAT};

fn collaborators(
    node: Arc<ScriptedNode>,
    transport: Arc<CountingTransport>,
    notifier: Arc<RecordingNotifier>,
    updates: Arc<QueuedUpdates>,
) -> Collaborators {
    Collaborators {
        node,
        transport,
        notifier,
        updates,
    }
}

#[tokio::test(start_paused = true)]
async fn test_startup_and_shutdown_messages_bracket_the_run() {
    let config = test_config(&[]);
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let supervisor = Supervisor::new(
        &config,
        collaborators(
            node.clone(),
            Arc::new(CountingTransport::default()),
            notifier.clone(),
            Arc::new(QueuedUpdates::default()),
        ),
        RetryConfig::default(),
    );

    supervisor.run_until(tokio::time::sleep(Duration::from_secs(1))).await;

    let texts = notifier.texts();
    assert_eq!(texts.len(), 2, "unexpected messages: {:?}", texts);
    assert!(texts[0].contains("Monitor Started"));
    assert!(texts[0].contains("testnode.onion:8080"));
    assert!(texts[1].contains("Monitor stopped"));
    assert_eq!(node.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_outage_alert_delivered_through_dispatcher() {
    let config = test_config(&[("MAX_RETRIES", "1")]);
    let node = Arc::new(ScriptedNode::unreachable());
    let transport = Arc::new(CountingTransport::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let supervisor = Supervisor::new(
        &config,
        collaborators(
            node.clone(),
            transport.clone(),
            notifier.clone(),
            Arc::new(QueuedUpdates::default()),
        ),
        RetryConfig::default(),
    );

    supervisor.run_until(tokio::time::sleep(Duration::from_secs(1))).await;

    let texts = notifier.texts();
    assert_eq!(texts.len(), 3, "unexpected messages: {:?}", texts);
    assert!(texts[1].contains("NODE OFFLINE"));
    assert!(texts[1].contains("Failed attempts: 1"));
    assert_eq!(transport.refreshes(), 1);
    assert_eq!(node.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_commands_answered_alongside_polling() {
    let config = test_config(&[]);
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let updates = Arc::new(QueuedUpdates::with_batches(vec![vec![message(1, OPERATOR_CHAT, "/monitor")]]));
    let supervisor = Supervisor::new(
        &config,
        collaborators(
            node.clone(),
            Arc::new(CountingTransport::default()),
            notifier.clone(),
            updates,
        ),
        RetryConfig::default(),
    );

    supervisor.run_until(tokio::time::sleep(Duration::from_secs(1))).await;

    let sent = notifier.sent();
    assert!(sent.iter().all(|(chat, _)| *chat == OPERATOR_CHAT));
    assert!(sent.iter().any(|(_, text)| text.contains("Monitor state")));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_probe_does_not_delay_command_reply() {
    let config = test_config(&[]);
    let node = Arc::new(ScriptedNode::healthy("node").stalling_first(Duration::from_secs(50)));
    let notifier = Arc::new(RecordingNotifier::default());
    let updates = Arc::new(QueuedUpdates::with_batches(vec![vec![message(1, OPERATOR_CHAT, "/monitor")]]));
    let supervisor = Supervisor::new(
        &config,
        collaborators(
            node.clone(),
            Arc::new(CountingTransport::default()),
            notifier.clone(),
            updates,
        ),
        RetryConfig::default(),
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(supervisor.run_until(async {
        let _ = stop_rx.await;
    }));

    tokio::time::sleep(Duration::from_secs(1)).await;

    // The first probe is still hanging, yet the command was answered.
    assert_eq!(node.calls(), 1);
    assert_eq!(node.completed(), 0);
    assert!(notifier.texts().iter().any(|text| text.contains("Monitor state")));

    stop_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_probe() {
    let config = test_config(&[]);
    let node = Arc::new(ScriptedNode::healthy("node").stalling_first(Duration::from_secs(50)));
    let notifier = Arc::new(RecordingNotifier::default());
    let supervisor = Supervisor::new(
        &config,
        collaborators(
            node.clone(),
            Arc::new(CountingTransport::default()),
            notifier.clone(),
            Arc::new(QueuedUpdates::default()),
        ),
        RetryConfig::default(),
    );

    let started = Instant::now();
    // Shutdown is requested while the first probe is still hanging.
    supervisor.run_until(tokio::time::sleep(Duration::from_secs(1))).await;

    assert!(started.elapsed() >= Duration::from_secs(50));
    assert_eq!(node.completed(), 1);
    let texts = notifier.texts();
    assert_eq!(texts.len(), 2, "unexpected messages: {:?}", texts);
    assert!(texts[0].contains("Monitor Started"));
    assert!(texts[1].contains("Monitor stopped"));
}
