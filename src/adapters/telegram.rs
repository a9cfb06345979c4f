//! Telegram Bot API notifications
//!
//! Alerts go out through `sendMessage` in HTML parse mode. Long texts are
//! split into chunks with a pause between them. A 429 answer carries
//! `parameters.retry_after`, which is honoured up to `max_retries` times per
//! chunk. A 400 answer means Telegram will never accept the chunk, so it is
//! logged and dropped.
//!
//! Telegram's HTML subset has no `<br>` tag, so it is removed before sending.

use super::notifier::{split_message, DeliveryReport, Notifier, DEFAULT_MAX_MESSAGE_LEN};
use crate::coordination::ShutdownListener;
use crate::error::{LineWatchError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Pause before retrying a transport failure
const TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Telegram notification client
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    max_message_len: usize,
    chunk_delay: Duration,
    max_retries: u32,
    shutdown: ShutdownListener,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            chunk_delay: Duration::from_secs(10),
            max_retries: 3,
            shutdown: ShutdownListener::never(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_chunking(mut self, max_message_len: usize, chunk_delay: Duration) -> Self {
        self.max_message_len = max_message_len;
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownListener) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// One `sendMessage` call, with the response mapped to an error variant
    async fn post_chunk(&self, chunk: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: chunk,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let raw = resp.text().await.unwrap_or_default();
        let parsed: Option<ApiError> = serde_json::from_str(&raw).ok();
        let description = parsed
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| raw.clone());

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = parsed
                    .and_then(|e| e.parameters)
                    .and_then(|p| p.retry_after)
                    .unwrap_or(1);
                Err(LineWatchError::RateLimited { retry_after_secs })
            }
            StatusCode::BAD_REQUEST => Err(LineWatchError::NotificationRejected(description)),
            _ => Err(LineWatchError::Internal(format!(
                "Telegram HTTP {}: {}",
                status, description
            ))),
        }
    }

    /// Deliver one chunk. `Ok(false)` means it was given up on.
    async fn deliver_chunk(&self, chunk: &str) -> Result<bool> {
        let mut shutdown = self.shutdown.clone();
        let mut attempt: u32 = 0;

        loop {
            let err = match self.post_chunk(chunk).await {
                Ok(()) => return Ok(true),
                Err(e) => e,
            };
            attempt += 1;

            let wait = match &err {
                LineWatchError::NotificationRejected(reason) => {
                    error!("Telegram rejected message chunk: {}", reason);
                    return Ok(false);
                }
                LineWatchError::RateLimited { retry_after_secs } => {
                    Duration::from_secs(*retry_after_secs)
                }
                e if e.is_transient() => TRANSPORT_RETRY_DELAY,
                _ => {
                    error!("Telegram send failed: {}", err);
                    return Ok(false);
                }
            };

            if attempt > self.max_retries {
                error!(
                    "Telegram send failed after {} retries, dropping chunk: {}",
                    self.max_retries, err
                );
                return Ok(false);
            }

            warn!(
                "Telegram send attempt {} failed ({}), retrying in {}s",
                attempt,
                err,
                wait.as_secs()
            );
            if !shutdown.sleep(wait).await {
                return Err(LineWatchError::Cancelled);
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();
        if text.trim().is_empty() {
            return Ok(report);
        }

        // Telegram's HTML mode has no <br>; every <br> is already followed by a newline
        let html = text.replace("<br>", "");
        let chunks = split_message(&html, self.max_message_len);
        let mut shutdown = self.shutdown.clone();

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && !shutdown.sleep(self.chunk_delay).await {
                return Err(LineWatchError::Cancelled);
            }
            let delivered = self.deliver_chunk(chunk).await?;
            report.record(delivered);
        }

        debug!(
            "Telegram delivery: {} sent, {} dropped",
            report.chunks_sent, report.chunks_dropped
        );
        Ok(report)
    }
}
