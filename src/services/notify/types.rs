use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::services::node::NodeSnapshot;

/// Operator-facing events produced by the supervisor and the poll loop
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Startup {
        node: String,
        check_interval: Duration,
        proxy: String,
    },
    Offline {
        at: DateTime<Utc>,
        last_success_at: Option<DateTime<Utc>>,
        failed_attempts: u32,
    },
    BackOnline {
        at: DateTime<Utc>,
        snapshot: NodeSnapshot,
    },
    Shutdown,
}

impl Notification {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Startup { .. } => "monitor.started",
            Self::Offline { .. } => "node.offline",
            Self::BackOnline { .. } => "node.back_online",
            Self::Shutdown => "monitor.stopped",
        }
    }
}

/// Delivers a formatted message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout")]
    Timeout,
    #[error("Telegram API error {status}: {description}")]
    Api { status: u16, description: String },
}

impl NotifyError {
    /// Client errors other than throttling will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NotifyError::Timeout
        } else {
            // The request URL embeds the bot token.
            NotifyError::Network(e.without_url().to_string())
        }
    }
}
