//! Notification sink that posts to a Telegram chat through the Bot API.

use serde::Serialize;
use tracing::debug;
use turnwatch_core::{DeliveryError, NotificationSink};

/// Posts messages with `sendMessage`.
pub struct TelegramSink {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramSink {
    /// Create a sink for `chat_id` using the bot identified by `bot_token`.
    pub fn new(client: reqwest::Client, api_url: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            endpoint: format!("{api_url}/bot{bot_token}/sendMessage"),
            chat_id: chat_id.to_owned(),
        }
    }
}

impl NotificationSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);
        check_response(status.as_u16(), &body)?;

        debug!(chat_id = self.chat_id, chars = text.chars().count(), "message delivered");
        Ok(())
    }
}

/// Interpret a Bot API reply. Anything but a 2xx status with `"ok": true`
/// is a rejection, described by the reply's `description` when present.
fn check_response(status: u16, body: &serde_json::Value) -> Result<(), DeliveryError> {
    let ok = body.get("ok").and_then(serde_json::Value::as_bool) == Some(true);
    if (200..300).contains(&status) && ok {
        return Ok(());
    }
    let description = body
        .get("description")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("no description");
    Err(DeliveryError::Rejected(format!("{status}: {description}")))
}
