use async_trait::async_trait;

use crate::services::notify::NotifyError;

/// A chat update as seen by the command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub update_id: i64,
    /// `None` for updates without a message (edits, joins).
    pub chat_id: Option<i64>,
    pub username: Option<String>,
    pub text: Option<String>,
}

/// Source of operator updates, long-polled by the command listener.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Updates with `update_id >= offset`; may block up to the long-poll window.
    async fn next_batch(&self, offset: i64) -> Result<Vec<IncomingMessage>, NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Live node query
    Status,
    /// Monitor state and circuit info
    Monitor,
    Help,
    Unknown,
}

impl Command {
    /// Parse `/status`, `/status@BotName`, or `/status extra args`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        Some(match name.to_ascii_lowercase().as_str() {
            "status" | "info" => Self::Status,
            "monitor" | "health" => Self::Monitor,
            "help" | "start" => Self::Help,
            _ => Self::Unknown,
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::Monitor => "monitor",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }

    /// Commands that reach the node over Tor
    pub fn is_live_lookup(&self) -> bool {
        matches!(self, Self::Status)
    }
}
