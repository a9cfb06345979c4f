//! Outbound alert delivery
//!
//! Chat backends take the rendered alert text as produced by the formatter
//! (`<b>` and `<br>` markup) and deliver it in chunks that fit the
//! backend's message size limit.

use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Telegram's hard limit on message length, in characters
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4096;

/// Outcome of one `send` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub chunks_sent: usize,
    pub chunks_dropped: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, delivered: bool) {
        if delivered {
            self.chunks_sent += 1;
        } else {
            self.chunks_dropped += 1;
        }
    }
}

/// A channel alerts can be delivered to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Deliver an alert text, splitting it as needed.
    ///
    /// Rejected chunks are logged and counted as dropped. An `Err` means
    /// delivery was abandoned, e.g. on shutdown.
    async fn send(&self, text: &str) -> Result<DeliveryReport>;
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// A chunk ends after the last newline inside the window when there is one,
/// so alerts are not cut mid-line unless a single line is too long.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if cut == rest.len() {
            chunks.push(rest.to_string());
            break;
        }

        let split_at = rest[..cut]
            .rfind('\n')
            .filter(|&i| i > 0)
            .map(|i| i + 1)
            .unwrap_or(cut);
        chunks.push(rest[..split_at].to_string());
        rest = &rest[split_at..];
    }

    chunks
}

/// Turn chat markup into plain text for backends without HTML support
pub fn strip_markup(text: &str) -> String {
    text.replace("<br>", "\n")
        .replace("<b>", "")
        .replace("</b>", "")
}

/// Writes alerts to the log instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, text: &str) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();
        for chunk in split_message(text, DEFAULT_MAX_MESSAGE_LEN) {
            info!("[dry-run] alert:\n{}", strip_markup(&chunk));
            report.record(true);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn test_hard_split_without_newlines() {
        let chunks = split_message(&"a".repeat(10), 4);
        assert_eq!(chunks, vec!["aaaa", "aaaa", "aa"]);
    }

    #[test]
    fn test_split_prefers_newline() {
        let chunks = split_message("ab\ncd\nef", 6);
        assert_eq!(chunks, vec!["ab\ncd\n", "ef"]);

        let chunks = split_message("abc\ndefgh", 6);
        assert_eq!(chunks, vec!["abc\n", "defgh"]);
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let text = "é".repeat(5);
        let chunks = split_message(&text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2));
    }

    #[test]
    fn test_chunks_rejoin_to_original() {
        let text = "<b>Alert</b><br>\n- line one\n- line two\n\nBet on Heat\n".repeat(40);
        let chunks = split_message(&text, 100);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<b>Reverse Line Movement Detected for Knicks</b><br>\n- Best"),
            "Reverse Line Movement Detected for Knicks\n\n- Best"
        );
    }

    #[tokio::test]
    async fn test_log_notifier_counts_chunks() {
        let report = LogNotifier.send("Bet on Heat").await.unwrap();
        assert_eq!(report.chunks_sent, 1);
        assert_eq!(report.chunks_dropped, 0);
    }
}
