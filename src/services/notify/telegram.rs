use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::modules::commands::{IncomingMessage, UpdateSource};
use crate::services::notify::{Notifier, NotifyError, RetryConfig};

const LONG_POLL_SECS: u64 = 30;
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

/// Telegram Bot API client
/// Talks to the Bot API directly, not through Tor.
pub struct TelegramClient {
    client: Client,
    token: String,
    base_url: String,
    send_timeout: Duration,
    long_poll: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}

impl TelegramClient {
    pub fn new(token: String, retry_config: &RetryConfig) -> Result<Self, NotifyError> {
        let long_poll = Duration::from_secs(LONG_POLL_SECS);
        let client = Client::builder().timeout(long_poll + LONG_POLL_SLACK).build()?;

        Ok(Self {
            client,
            token,
            base_url: "https://api.telegram.org".to_string(),
            send_timeout: retry_config.timeout(),
            long_poll,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Server-side wait for `getUpdates`; the request itself is bounded by
    /// this plus a fixed slack.
    pub fn with_long_poll(mut self, long_poll: Duration) -> Self {
        self.long_poll = long_poll;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }
}

fn unwrap_envelope<T>(status: u16, envelope: ApiEnvelope<T>) -> Result<Option<T>, NotifyError> {
    if envelope.ok {
        return Ok(envelope.result);
    }
    Err(NotifyError::Api {
        status: envelope.error_code.unwrap_or(status),
        description: envelope.description.unwrap_or_default(),
    })
}

fn into_messages(updates: Vec<Update>) -> Vec<IncomingMessage> {
    updates
        .into_iter()
        .map(|update| {
            let message = update.message;
            IncomingMessage {
                update_id: update.update_id,
                chat_id: message.as_ref().map(|m| m.chat.id),
                username: message
                    .as_ref()
                    .and_then(|m| m.from.as_ref())
                    .and_then(|u| u.username.clone()),
                text: message.and_then(|m| m.text),
            }
        })
        .collect()
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let chat_id = chat_id.to_string();
        let form = [
            ("chat_id", chat_id.as_str()),
            ("text", text),
            ("parse_mode", "HTML"),
        ];

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .form(&form)
            .timeout(self.send_timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let envelope: ApiEnvelope<serde_json::Value> = response.json().await?;
        unwrap_envelope(status, envelope).map(|_| ())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn next_batch(&self, offset: i64) -> Result<Vec<IncomingMessage>, NotifyError> {
        let offset = offset.to_string();
        let timeout = self.long_poll.as_secs().to_string();
        let query = [
            ("offset", offset.as_str()),
            ("timeout", timeout.as_str()),
            ("allowed_updates", r#"["message"]"#),
        ];

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(self.long_poll + LONG_POLL_SLACK)
            .send()
            .await?;

        let status = response.status().as_u16();
        let envelope: ApiEnvelope<Vec<Update>> = response.json().await?;
        let updates = unwrap_envelope(status, envelope)?.unwrap_or_default();
        Ok(into_messages(updates))
    }
}
