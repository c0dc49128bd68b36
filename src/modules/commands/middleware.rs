use crate::modules::commands::{Command, IncomingMessage};
use crate::services::rate_limit::CommandRateLimiter;

/// A command that passed every check in front of the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedCommand {
    pub chat_id: i64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotACommand,
    Unauthorized { chat_id: Option<i64> },
    Throttled { chat_id: i64 },
}

/// Only the configured operator chat may issue commands.
pub fn require_operator(authorized_chat: i64, message: &IncomingMessage) -> Result<AuthorizedCommand, Rejection> {
    let command = message
        .text
        .as_deref()
        .and_then(Command::parse)
        .ok_or(Rejection::NotACommand)?;

    match message.chat_id {
        Some(chat_id) if chat_id == authorized_chat => Ok(AuthorizedCommand { chat_id, command }),
        other => Err(Rejection::Unauthorized { chat_id: other }),
    }
}

/// Live lookups go through Tor; keep the operator from queueing a burst of them.
pub fn throttle_lookups(limiter: &CommandRateLimiter, command: AuthorizedCommand) -> Result<AuthorizedCommand, Rejection> {
    if command.command.is_live_lookup() && limiter.check().is_err() {
        return Err(Rejection::Throttled {
            chat_id: command.chat_id,
        });
    }
    Ok(command)
}

/// Authorization followed by throttling, run before every handler.
pub struct CommandGuard {
    authorized_chat: i64,
    limiter: CommandRateLimiter,
}

impl CommandGuard {
    pub fn new(authorized_chat: i64, limiter: CommandRateLimiter) -> Self {
        Self {
            authorized_chat,
            limiter,
        }
    }

    pub fn admit(&self, message: &IncomingMessage) -> Result<AuthorizedCommand, Rejection> {
        let command = require_operator(self.authorized_chat, message)?;
        throttle_lookups(&self.limiter, command)
    }
}
