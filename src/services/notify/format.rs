use chrono::{DateTime, Utc};

use crate::services::node::NodeSnapshot;
use crate::services::notify::Notification;

const FULL_TIMESTAMP: &str = "%d/%m/%Y %H:%M:%S UTC";
const TIME_ONLY: &str = "%H:%M:%S UTC";

/// Render a notification as Telegram HTML.
pub fn render(notification: &Notification) -> String {
    match notification {
        Notification::Startup {
            node,
            check_interval,
            proxy,
        } => format!(
            "🚀 <b>LND Monitor Started</b>\n\
             🎯 Node: {}\n\
             ⏱️ Interval: {}s\n\
             🔧 Proxy: {}",
            escape_html(node),
            check_interval.as_secs(),
            escape_html(proxy)
        ),
        Notification::Offline {
            at,
            last_success_at,
            failed_attempts,
        } => format!(
            "🚨 <b>NODE OFFLINE!</b>\n\
             ⏰ {}\n\
             ❌ Last successful check: {}\n\
             🔄 Failed attempts: {}",
            at.format(FULL_TIMESTAMP),
            last_success_at
                .map(|t| t.format(TIME_ONLY).to_string())
                .unwrap_or_else(|| "never".to_string()),
            failed_attempts
        ),
        Notification::BackOnline { at, snapshot } => format!(
            "✅ <b>Node BACK ONLINE!</b>\n⏰ {}\n{}",
            at.format(FULL_TIMESTAMP),
            format_snapshot(snapshot)
        ),
        Notification::Shutdown => "🛑 <b>LND Monitor stopped</b>".to_string(),
    }
}

/// Node status block shared by recovery messages and /status replies.
pub fn format_snapshot(snapshot: &NodeSnapshot) -> String {
    let status_icon = if snapshot.synced_to_chain { "🟢" } else { "🟡" };
    format!(
        "{} <b>LND Node Online</b>\n\
         📛 Alias: {}\n\
         🔧 Version: {}\n\
         📊 Block: {}\n\
         ⚡ Active channels: {}\n\
         👥 Peers: {}\n\
         🔗 Synced: {}",
        status_icon,
        escape_html(or_na(&snapshot.alias)),
        escape_html(or_na(&snapshot.version)),
        snapshot.block_height,
        snapshot.num_active_channels,
        snapshot.num_peers,
        if snapshot.synced_to_chain { "Yes" } else { "No" }
    )
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(FULL_TIMESTAMP).to_string()
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Node aliases are operator-controlled text; keep them from breaking HTML parse mode.
pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
