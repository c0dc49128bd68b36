// =============================================================================
// INTEGRATION TESTS - COMMAND LISTENER
// Authorization, throttling and the long-poll loop
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use onion_node_monitor::modules::commands::{CommandGuard, CommandListener, CommandResponder};
use onion_node_monitor::services::monitor::{MonitorState, MonitorStatus};
use onion_node_monitor::services::rate_limit::create_command_limiter;

use crate::common::{message, QueuedUpdates, RecordingNotifier, ScriptedNode, OPERATOR_CHAT};

fn listener(
    node: Arc<ScriptedNode>,
    updates: Arc<QueuedUpdates>,
    notifier: Arc<RecordingNotifier>,
    lookups_per_minute: u32,
) -> CommandListener {
    let (_tx, status_rx) = watch::channel(MonitorStatus {
        state: MonitorState::default(),
        max_retries: 3,
        circuit_refreshes: 0,
        last_circuit_refresh_at: None,
    });
    let responder = CommandResponder::new(node, status_rx, Duration::from_secs(5));
    let guard = CommandGuard::new(OPERATOR_CHAT, create_command_limiter(lookups_per_minute, lookups_per_minute));
    CommandListener::new(updates, notifier, guard, responder)
}

#[tokio::test]
async fn test_unauthorized_chat_gets_nothing() {
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let listener = listener(node.clone(), Arc::new(QueuedUpdates::default()), notifier.clone(), 6);

    let reply = listener.handle(&message(1, 999, "/status")).await;

    assert!(reply.is_none());
    assert_eq!(node.calls(), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_operator_status_answered_in_same_chat() {
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let listener = listener(node.clone(), Arc::new(QueuedUpdates::default()), notifier.clone(), 6);

    let reply = listener.handle(&message(1, OPERATOR_CHAT, "/status")).await.unwrap();

    assert!(reply.contains("Alias: node"));
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, OPERATOR_CHAT);
}

#[tokio::test]
async fn test_live_lookups_throttled() {
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let listener = listener(node.clone(), Arc::new(QueuedUpdates::default()), notifier.clone(), 1);

    listener.handle(&message(1, OPERATOR_CHAT, "/status")).await;
    let throttled = listener.handle(&message(2, OPERATOR_CHAT, "/status")).await.unwrap();

    assert!(throttled.contains("Too many live lookups"));
    assert_eq!(node.calls(), 1);
}

#[tokio::test]
async fn test_plain_chatter_ignored() {
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let listener = listener(node, Arc::new(QueuedUpdates::default()), notifier.clone(), 6);

    assert!(listener.handle(&message(1, OPERATOR_CHAT, "thanks bot")).await.is_none());
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_run_advances_offset_and_stops_on_shutdown() {
    let node = Arc::new(ScriptedNode::healthy("node"));
    let notifier = Arc::new(RecordingNotifier::default());
    let updates = Arc::new(QueuedUpdates::with_batches(vec![vec![
        message(10, 999, "/status"),
        message(11, OPERATOR_CHAT, "/help"),
    ]]));
    let listener = listener(node.clone(), updates.clone(), notifier.clone(), 6);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(listener.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("listener stops promptly")
        .unwrap();

    assert_eq!(updates.offsets(), vec![0, 12]);
    let texts = notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("/monitor"));
    assert_eq!(node.calls(), 0);
}
