use std::sync::Arc;
use tokio::sync::mpsc;

use crate::services::notify::{format, Notification, Notifier, RetryConfig};

pub type NotificationSender = mpsc::Sender<Notification>;

/// Outbound queue between the monitor and the dispatcher.
pub fn notification_channel(capacity: usize) -> (NotificationSender, mpsc::Receiver<Notification>) {
    mpsc::channel(capacity)
}

/// Notification dispatcher delivers queued events to the operator chat with retry.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    chat_id: i64,
    retry_config: RetryConfig,
    queue: mpsc::Receiver<Notification>,
}

impl NotificationDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        chat_id: i64,
        retry_config: RetryConfig,
        queue: mpsc::Receiver<Notification>,
    ) -> Self {
        Self {
            notifier,
            chat_id,
            retry_config,
            queue,
        }
    }

    /// Drain the queue until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(notification) = self.queue.recv().await {
            self.deliver(&notification).await;
        }
        tracing::debug!("notification queue closed");
    }

    /// Deliver one notification. Failures are logged, never escalated.
    pub async fn deliver(&self, notification: &Notification) -> bool {
        let text = format::render(notification);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.notifier.send(self.chat_id, &text).await {
                Ok(()) => {
                    tracing::info!(event = notification.as_str(), "Telegram message sent successfully");
                    return true;
                }
                Err(e) if e.is_retryable() && self.retry_config.should_retry(attempts) => {
                    let delay = self.retry_config.calculate_delay(attempts - 1);
                    tracing::warn!(
                        event = notification.as_str(),
                        attempt = attempts,
                        "Telegram sending error: {}, retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        event = notification.as_str(),
                        attempts,
                        "Telegram sending error: {}",
                        e
                    );
                    return false;
                }
            }
        }
    }
}
