use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::modules::commands::{CommandGuard, CommandResponder, IncomingMessage, Rejection, UpdateSource};
use crate::services::notify::Notifier;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Command-listening loop. Runs independently of the poll loop.
pub struct CommandListener {
    source: Arc<dyn UpdateSource>,
    notifier: Arc<dyn Notifier>,
    guard: CommandGuard,
    responder: CommandResponder,
    offset: i64,
}

impl CommandListener {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        notifier: Arc<dyn Notifier>,
        guard: CommandGuard,
        responder: CommandResponder,
    ) -> Self {
        Self {
            source,
            notifier,
            guard,
            responder,
            offset: 0,
        }
    }

    /// Long-poll for commands until shutdown. Waiting for updates is
    /// abandoned on shutdown; a command already being handled finishes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Command listener started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                batch = self.source.next_batch(self.offset) => batch,
                _ = shutdown.changed() => break,
            };

            match batch {
                Ok(messages) => {
                    for message in messages {
                        self.offset = self.offset.max(message.update_id + 1);
                        self.handle(&message).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch updates: {}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }
        tracing::info!("Command listener stopped");
    }

    /// Handle one update; returns the reply sent, if any.
    pub async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        match self.guard.admit(message) {
            Ok(admitted) => {
                tracing::info!(command = admitted.command.as_str(), "Command received");
                let reply = self.responder.respond(admitted.command).await;
                self.reply(admitted.chat_id, &reply).await;
                Some(reply)
            }
            Err(Rejection::NotACommand) => None,
            Err(Rejection::Unauthorized { chat_id }) => {
                tracing::warn!(
                    chat_id = ?chat_id,
                    username = ?message.username,
                    "Ignoring command from unauthorized chat"
                );
                None
            }
            Err(Rejection::Throttled { chat_id }) => {
                let reply = "⏳ Too many live lookups, try again in a minute.".to_string();
                self.reply(chat_id, &reply).await;
                Some(reply)
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.notifier.send(chat_id, text).await {
            tracing::error!("Failed to send command reply: {}", e);
        }
    }
}
