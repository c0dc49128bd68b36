use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::services::circuit::{CircuitManager, RefreshReason};
use crate::services::monitor::state::{MonitorState, OutageStateMachine, Transition};
use crate::services::notify::{Notification, NotificationSender};
use crate::services::probe::{HealthProbe, ProbeOutcome};

/// Read-only view published after every cycle for the command path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub max_retries: u32,
    pub circuit_refreshes: u64,
    pub last_circuit_refresh_at: Option<DateTime<Utc>>,
}

/// What happened during one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: ProbeOutcome,
    pub retried: bool,
    pub scheduled_refresh: bool,
    pub transition: Transition,
}

/// Poll loop: probe → circuit policy → state machine → dispatch, strictly in sequence.
pub struct MonitorEngine {
    probe: HealthProbe,
    circuit: CircuitManager,
    machine: OutageStateMachine,
    notifications: NotificationSender,
    status_tx: watch::Sender<MonitorStatus>,
    check_interval: Duration,
}

impl MonitorEngine {
    pub fn new(
        probe: HealthProbe,
        circuit: CircuitManager,
        machine: OutageStateMachine,
        notifications: NotificationSender,
        check_interval: Duration,
    ) -> Self {
        let initial = MonitorStatus {
            state: machine.state().clone(),
            max_retries: machine.max_retries(),
            circuit_refreshes: 0,
            last_circuit_refresh_at: None,
        };
        let (status_tx, _) = watch::channel(initial);

        Self {
            probe,
            circuit,
            machine,
            notifications,
            status_tx,
            check_interval,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> &MonitorState {
        self.machine.state()
    }

    /// Run cycles every `check_interval` until shutdown is signalled.
    /// A cycle already in flight always completes first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Starting monitoring...");
        let mut tick = tokio::time::interval(self.check_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Poll loop stopped");
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        tracing::info!("Checking node at {}", Utc::now().format("%H:%M:%S"));
        self.circuit.begin_cycle();

        let scheduled_refresh = self.circuit.refresh_if_due().await;

        let mut outcome = self.probe.probe().await;
        let mut retried = false;

        // A stale circuit, not the node, is the usual cause of transport errors:
        // rebuild it and ask once more before counting a failure.
        if outcome.warrants_circuit_refresh() {
            tracing::info!(kind = outcome.kind(), "Probe failed at transport level, refreshing circuit and retrying");
            self.circuit.request_refresh(RefreshReason::FailureTriggered).await;
            outcome = self.probe.probe().await;
            retried = true;
        }

        let transition = self.machine.apply(&outcome, Utc::now());
        self.dispatch(&transition).await;
        self.publish();

        CycleReport {
            outcome,
            retried,
            scheduled_refresh,
            transition,
        }
    }

    async fn dispatch(&mut self, transition: &Transition) {
        match transition {
            Transition::None => {}
            Transition::WentOffline {
                at,
                last_success_at,
                consecutive_failures,
            } => {
                let notification = Notification::Offline {
                    at: *at,
                    last_success_at: *last_success_at,
                    failed_attempts: *consecutive_failures,
                };
                if self.notifications.send(notification).await.is_ok() {
                    self.machine.mark_alert_sent();
                } else {
                    tracing::error!("Notification queue closed, offline alert dropped");
                }
            }
            Transition::BackOnline { at, snapshot } => {
                let notification = Notification::BackOnline {
                    at: *at,
                    snapshot: snapshot.clone(),
                };
                if self.notifications.send(notification).await.is_err() {
                    tracing::error!("Notification queue closed, recovery message dropped");
                }
            }
        }
    }

    fn publish(&self) {
        let circuit = self.circuit.state();
        let status = MonitorStatus {
            state: self.machine.state().clone(),
            max_retries: self.machine.max_retries(),
            circuit_refreshes: circuit.refresh_count,
            last_circuit_refresh_at: circuit.last_refreshed_wall,
        };
        // No receivers is fine; the command path may not be running.
        self.status_tx.send_replace(status);
    }
}
