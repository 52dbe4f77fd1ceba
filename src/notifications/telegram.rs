// src/notifications/telegram.rs

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::sink::{NotificationSink, OutgoingMessage, SinkError};

/// Telegram Bot API client for `sendMessage`.
pub struct TelegramSink {
    api_base: String,
    bot_token: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

impl TelegramSink {
    pub fn new(api_base: &str, bot_token: String, timeout: Duration) -> Result<Self, SinkError> {
        if bot_token.trim().is_empty() {
            return Err(SinkError::Config("Telegram bot token must not be empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Chat id of the first message the bot has received, if any. Used once
    /// at setup to find the value for `TELEGRAM_CHAT_ID`.
    pub fn discover_chat_id(&self) -> Result<Option<i64>, SinkError> {
        let resp = self.client.get(self.method_url("getUpdates")).send()?;
        let status = resp.status().as_u16();
        let body: ApiResponse = resp.json()?;
        if !body.ok {
            return Err(SinkError::Rejected {
                status,
                description: body.description.unwrap_or_else(|| "(no description)".into()),
            });
        }
        Ok(body.result.as_ref().and_then(first_chat_id))
    }
}

impl NotificationSink for TelegramSink {
    fn send(&self, message: &OutgoingMessage) -> Result<(), SinkError> {
        let payload = SendMessagePayload {
            chat_id: &message.chat_id,
            text: &message.text,
            parse_mode: message.parse_mode.as_str(),
            disable_web_page_preview: message.disable_link_preview,
        };

        debug!(chat_id = %message.chat_id, "Sending Telegram message");

        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()?;

        let status = resp.status();
        let text = resp.text().unwrap_or_else(|_| "(no body)".to_string());
        acknowledge(status.as_u16(), &text)
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}

/// Delivery counts only with a 2xx status and `"ok": true`.
fn acknowledge(status: u16, body: &str) -> Result<(), SinkError> {
    let parsed: Option<ApiResponse> = serde_json::from_str(body).ok();
    match parsed {
        Some(r) if (200..300).contains(&status) && r.ok => Ok(()),
        Some(r) => Err(SinkError::Rejected {
            status,
            description: r.description.unwrap_or_else(|| "(no description)".into()),
        }),
        None => Err(SinkError::Rejected {
            status,
            description: body.chars().take(200).collect(),
        }),
    }
}

fn first_chat_id(result: &Value) -> Option<i64> {
    result
        .as_array()?
        .iter()
        .find_map(|update| update.pointer("/message/chat/id")?.as_i64())
}
