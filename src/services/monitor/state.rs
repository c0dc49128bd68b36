use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::services::node::NodeSnapshot;
use crate::services::probe::ProbeOutcome;

const HEALTHY_LOG_EVERY_MINUTES: i64 = 30;

/// Believed reachability of the node. Written only by the poll task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorState {
    pub is_online: bool,
    pub consecutive_failures: u32,
    /// Set only once an OFFLINE alert has been handed to the dispatcher.
    pub alert_sent: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_check_at: Option<DateTime<Utc>>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            is_online: true,
            consecutive_failures: 0,
            alert_sent: false,
            last_success_at: None,
            last_check_at: None,
        }
    }
}

/// What the operator should hear about after applying a probe outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    None,
    WentOffline {
        at: DateTime<Utc>,
        last_success_at: Option<DateTime<Utc>>,
        consecutive_failures: u32,
    },
    BackOnline {
        at: DateTime<Utc>,
        snapshot: NodeSnapshot,
    },
}

/// ONLINE/OFFLINE debounce over post-retry probe outcomes.
#[derive(Debug, Clone)]
pub struct OutageStateMachine {
    state: MonitorState,
    max_retries: u32,
    last_healthy_log_at: Option<DateTime<Utc>>,
}

impl OutageStateMachine {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: MonitorState::default(),
            max_retries: max_retries.max(1),
            last_healthy_log_at: None,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Apply one confirmed probe outcome.
    pub fn apply(&mut self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> Transition {
        self.state.last_check_at = Some(now);

        match outcome {
            ProbeOutcome::Success(snapshot) => self.record_success(snapshot, now),
            _ => self.record_failure(now),
        }
    }

    /// The OFFLINE alert reached the dispatcher queue.
    pub fn mark_alert_sent(&mut self) {
        if !self.state.is_online {
            self.state.alert_sent = true;
        }
    }

    fn record_success(&mut self, snapshot: &NodeSnapshot, now: DateTime<Utc>) -> Transition {
        let was_offline = !self.state.is_online;
        let announce_recovery = was_offline && self.state.alert_sent;

        self.state.is_online = true;
        self.state.alert_sent = false;
        self.state.consecutive_failures = 0;
        self.state.last_success_at = Some(now);

        if announce_recovery {
            tracing::info!("Node back online");
            self.last_healthy_log_at = Some(now);
            return Transition::BackOnline {
                at: now,
                snapshot: snapshot.clone(),
            };
        }

        if was_offline {
            tracing::info!("Node reachable again; no outage alert had been delivered");
        } else if self.healthy_log_due(now) {
            tracing::info!("Node working correctly");
            self.last_healthy_log_at = Some(now);
        }
        Transition::None
    }

    fn record_failure(&mut self, now: DateTime<Utc>) -> Transition {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        tracing::warn!(
            "Failed attempt {}/{}",
            self.state.consecutive_failures,
            self.max_retries
        );

        if self.state.is_online && self.state.consecutive_failures >= self.max_retries {
            self.state.is_online = false;
            tracing::error!("Node considered offline");
            return Transition::WentOffline {
                at: now,
                last_success_at: self.state.last_success_at,
                consecutive_failures: self.state.consecutive_failures,
            };
        }
        Transition::None
    }

    fn healthy_log_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_healthy_log_at {
            None => true,
            Some(last) => now - last >= ChronoDuration::minutes(HEALTHY_LOG_EVERY_MINUTES),
        }
    }
}
