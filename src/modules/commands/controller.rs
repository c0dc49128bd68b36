use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::modules::commands::Command;
use crate::services::monitor::MonitorStatus;
use crate::services::node::NodeApi;
use crate::services::notify::format::{escape_html, format_snapshot, format_timestamp};

const HELP_TEXT: &str = "🤖 <b>LND Monitor</b>\n\
    /status - live node query over Tor\n\
    /monitor - monitor state and circuit info\n\
    /help - this message";

/// Builds replies to operator commands.
///
/// `/status` always queries the node live; `/monitor` reads the state the
/// poll loop last published. Neither touches the monitor state.
pub struct CommandResponder {
    node: Arc<dyn NodeApi>,
    status: watch::Receiver<MonitorStatus>,
    timeout: Duration,
}

impl CommandResponder {
    pub fn new(node: Arc<dyn NodeApi>, status: watch::Receiver<MonitorStatus>, timeout: Duration) -> Self {
        Self { node, status, timeout }
    }

    pub async fn respond(&self, command: Command) -> String {
        match command {
            Command::Status => self.live_status().await,
            Command::Monitor => self.monitor_status(),
            Command::Help => HELP_TEXT.to_string(),
            Command::Unknown => "❓ Unknown command. Try /help".to_string(),
        }
    }

    async fn live_status(&self) -> String {
        let error = match tokio::time::timeout(self.timeout, self.node.get_info()).await {
            Ok(Ok(snapshot)) => {
                return format!(
                    "{}\n🕒 As of {}",
                    format_snapshot(&snapshot),
                    format_timestamp(Utc::now())
                );
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timeout after {}s", self.timeout.as_secs()),
        };
        tracing::warn!("Live status lookup failed: {}", error);
        format!("❌ Unable to get node info: {}", escape_html(&error))
    }

    fn monitor_status(&self) -> String {
        // Copy out so the watch lock is not held while formatting.
        let status = self.status.borrow().clone();
        let state = &status.state;

        format!(
            "📡 <b>Monitor state</b>\n\
             State: {}\n\
             🔄 Consecutive failures: {}/{}\n\
             ✅ Last success: {}\n\
             ⏰ Last check: {}\n\
             🚨 Offline alert sent: {}\n\
             🧅 Circuit refreshes: {} (last: {})",
            if state.is_online { "🟢 ONLINE" } else { "🔴 OFFLINE" },
            state.consecutive_failures,
            status.max_retries,
            or_never(state.last_success_at),
            or_never(state.last_check_at),
            if state.alert_sent { "yes" } else { "no" },
            status.circuit_refreshes,
            status
                .last_circuit_refresh_at
                .map(format_timestamp)
                .unwrap_or_else(|| "initial circuit".to_string()),
        )
    }
}

fn or_never(at: Option<DateTime<Utc>>) -> String {
    at.map(format_timestamp).unwrap_or_else(|| "never".to_string())
}
