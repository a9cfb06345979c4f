//! Feishu (Lark) webhook notifications
//!
//! Sends alert text to a Feishu bot. Feishu text messages have no markup,
//! so `<b>` and `<br>` are stripped first.

use super::notifier::{split_message, strip_markup, DeliveryReport, Notifier};
use crate::coordination::ShutdownListener;
use crate::error::{LineWatchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

/// Feishu caps text messages well above this; keep chunks readable
const FEISHU_MAX_MESSAGE_LEN: usize = 4096;

/// Feishu notification client
#[derive(Debug, Clone)]
pub struct FeishuNotifier {
    client: Client,
    webhook_url: String,
    max_message_len: usize,
    chunk_delay: Duration,
    shutdown: ShutdownListener,
}

#[derive(Serialize)]
struct FeishuMessage<'a> {
    msg_type: &'a str,
    content: FeishuContent<'a>,
}

#[derive(Serialize)]
struct FeishuContent<'a> {
    text: &'a str,
}

impl FeishuNotifier {
    /// Create a new Feishu notifier with explicit URL
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
            max_message_len: FEISHU_MAX_MESSAGE_LEN,
            chunk_delay: Duration::from_secs(1),
            shutdown: ShutdownListener::never(),
        }
    }

    pub fn with_chunking(mut self, max_message_len: usize, chunk_delay: Duration) -> Self {
        self.max_message_len = max_message_len;
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownListener) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Send a text message to Feishu
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let message = FeishuMessage {
            msg_type: "text",
            content: FeishuContent { text },
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("Feishu notification sent successfully");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(LineWatchError::NotificationRejected(format!(
                "HTTP {}: {}",
                status, body
            )))
        }
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    fn name(&self) -> &'static str {
        "feishu"
    }

    async fn send(&self, text: &str) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();
        let plain = strip_markup(text);
        if plain.trim().is_empty() {
            return Ok(report);
        }

        let mut shutdown = self.shutdown.clone();
        for (i, chunk) in split_message(&plain, self.max_message_len).iter().enumerate() {
            if i > 0 && !shutdown.sleep(self.chunk_delay).await {
                return Err(LineWatchError::Cancelled);
            }
            match self.send_message(chunk).await {
                Ok(()) => report.record(true),
                Err(e) => {
                    error!("Feishu notification failed: {}", e);
                    report.record(false);
                }
            }
        }
        Ok(report)
    }
}
