use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Rejected by sink (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },
    #[error("Sink config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Request(e.to_string())
    }
}

/// Markup dialect of `OutgoingMessage::text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Telegram's HTML subset: `<b>`, `<a href>`.
    Html,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: ParseMode,
    pub disable_link_preview: bool,
}

/// Where notifications go. `Ok` only on a positive acknowledgment.
pub trait NotificationSink: Send + Sync {
    fn send(&self, message: &OutgoingMessage) -> Result<(), SinkError>;

    fn channel_name(&self) -> &str;
}
