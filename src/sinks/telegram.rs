use crate::alerts::{Markup, NotificationKind, NotificationSink};
use crate::config::TelegramSinkConfig;
use crate::error::AlertError;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Delivers notifications to a Telegram chat through the Bot API
///
/// Messages are sent with HTML parse mode. Each send is bounded by the configured
/// timeout and runs on the sink's own single-threaded runtime, so `notify` blocks
/// the calling thread for at most that long.
pub struct TelegramSink {
    client: Client,
    runtime: Runtime,
    api_base: String,
    bot_token: String,
    chat_id: String,
    timeout: Duration,
}

/// Body of a `sendMessage` call
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramSink {
    /// Create a new Telegram sink
    ///
    /// # Errors
    ///
    /// Returns `AlertError` if the HTTP client or runtime cannot be built.
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build()?;
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            client,
            runtime,
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token,
            chat_id,
            timeout,
        })
    }

    pub fn from_config(config: &TelegramSinkConfig) -> Result<Self, AlertError> {
        Self::new(
            config.bot_token.clone(),
            config.chat_id.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Point the sink at a different Bot API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }

    async fn send_message(&self, text: &str) -> Result<(), AlertError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        // The endpoint embeds the bot token, so it must never reach an error message
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| AlertError::HttpError(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AlertError::NotificationFailed(format!(
                "Telegram API returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

impl NotificationSink for TelegramSink {
    fn notify(&self, kind: NotificationKind, message: &str) -> Result<(), AlertError> {
        debug!("Sending {} notification to Telegram chat {}", kind, self.chat_id);

        self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, self.send_message(message))
                .await
                .map_err(|_| AlertError::Timeout(self.timeout.as_secs()))?
        })
    }

    fn markup(&self) -> Markup {
        Markup::Html
    }
}
