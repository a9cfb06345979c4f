use crate::adapters::FeedSource;
use crate::strategy::LineMovementConfig;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detector: LineMovementConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// HTTP endpoint serving the extracted odds feed
    pub feed_url: Option<String>,
    /// Local file holding the extracted odds feed
    pub feed_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            feed_url: None,
            feed_path: None,
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    /// URL wins over file when both are set
    pub fn source(&self) -> Option<FeedSource> {
        match (&self.feed_url, &self.feed_path) {
            (Some(url), _) if !url.trim().is_empty() => Some(FeedSource::Url(url.trim().to_string())),
            (_, Some(path)) => Some(FeedSource::File(path.clone())),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Telegram,
    Feishu,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    /// Falls back to `TELEGRAM_BOT_TOKEN`
    pub telegram_bot_token: Option<String>,
    /// Falls back to `TELEGRAM_CHAT_ID`
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base: String,
    /// Falls back to `FEISHU_WEBHOOK_URL`
    pub feishu_webhook_url: Option<String>,
    /// Characters per message chunk
    pub max_message_len: usize,
    /// Pause between consecutive chunks
    pub chunk_delay_secs: u64,
    /// Retries per chunk on rate limiting or transport errors
    pub max_retries: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Telegram,
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_base: crate::adapters::telegram::TELEGRAM_API_BASE.to_string(),
            feishu_webhook_url: None,
            max_message_len: crate::adapters::notifier::DEFAULT_MAX_MESSAGE_LEN,
            chunk_delay_secs: 10,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifiedBackend {
    Csv,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub spread_snapshot_file: String,
    pub total_snapshot_file: String,
    pub notified_file: String,
    pub notified_backend: NotifiedBackend,
    /// Drop notified identifiers for past games when the store is opened
    pub prune_past_events: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            spread_snapshot_file: "nba_spread_snapshot.csv".to_string(),
            total_snapshot_file: "nba_total_snapshot.csv".to_string(),
            notified_file: "notified_movements.csv".to_string(),
            notified_backend: NotifiedBackend::Csv,
            prune_past_events: true,
        }
    }
}

impl StorageConfig {
    pub fn spread_snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.spread_snapshot_file)
    }

    pub fn total_snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.total_snapshot_file)
    }

    pub fn notified_path(&self) -> PathBuf {
        self.data_dir.join(&self.notified_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Time between the start of consecutive cycles
    pub poll_interval_secs: u64,
    /// Fetch attempts per cycle before the cycle is abandoned
    pub provider_attempts: u32,
    /// Fixed pause between fetch attempts
    pub provider_backoff_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            provider_attempts: 3,
            provider_backoff_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("notifier.kind", "telegram")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LINEWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (LINEWATCH_NOTIFIER__KIND, etc.)
            .add_source(
                Environment::with_prefix("LINEWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Pick up the conventional bot credential variables when the
    /// prefixed ones are not set
    fn apply_env_fallbacks(&mut self) {
        let notifier = &mut self.notifier;
        if notifier.telegram_bot_token.is_none() {
            notifier.telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok();
        }
        if notifier.telegram_chat_id.is_none() {
            notifier.telegram_chat_id = std::env::var("TELEGRAM_CHAT_ID").ok();
        }
        if notifier.feishu_webhook_url.is_none() {
            notifier.feishu_webhook_url = std::env::var("FEISHU_WEBHOOK_URL").ok();
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.provider.source().is_none() {
            errors.push("provider.feed_url or provider.feed_path must be set".to_string());
        }
        if self.provider.timeout_secs == 0 {
            errors.push("provider.timeout_secs must be positive".to_string());
        }

        match self.notifier.kind {
            NotifierKind::Telegram => {
                if is_blank(&self.notifier.telegram_bot_token) {
                    errors.push("notifier.telegram_bot_token is required for telegram".to_string());
                }
                if is_blank(&self.notifier.telegram_chat_id) {
                    errors.push("notifier.telegram_chat_id is required for telegram".to_string());
                }
                if self.notifier.max_message_len > crate::adapters::notifier::DEFAULT_MAX_MESSAGE_LEN {
                    errors.push("notifier.max_message_len exceeds Telegram's 4096 limit".to_string());
                }
            }
            NotifierKind::Feishu => {
                if is_blank(&self.notifier.feishu_webhook_url) {
                    errors.push("notifier.feishu_webhook_url is required for feishu".to_string());
                }
            }
            NotifierKind::Log => {}
        }
        if self.notifier.max_message_len == 0 {
            errors.push("notifier.max_message_len must be positive".to_string());
        }

        let detector = &self.detector;
        if detector.money_pivot <= Decimal::ZERO || detector.money_pivot >= Decimal::ONE {
            errors.push("detector.money_pivot must be between 0 and 1".to_string());
        }
        if detector.disagreement_threshold <= Decimal::ZERO
            || detector.disagreement_threshold >= Decimal::ONE
        {
            errors.push("detector.disagreement_threshold must be between 0 and 1".to_string());
        }
        if detector.opening_band < Decimal::ZERO {
            errors.push("detector.opening_band must not be negative".to_string());
        }

        if self.schedule.poll_interval_secs == 0 {
            errors.push("schedule.poll_interval_secs must be positive".to_string());
        }
        if self.schedule.provider_attempts == 0 {
            errors.push("schedule.provider_attempts must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
