//! Cycle orchestration
//!
//! One cycle loads the previous snapshots, fetches the current ones, runs
//! detection and dedup per bet type, sends whatever is new and persists the
//! current snapshots for the next cycle. The driver loop repeats cycles on
//! a fixed interval until shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::alerts::process_and_format;
use super::detectors::LineMovementDetector;
use super::idempotency::{CsvNotifiedStore, MemoryNotifiedStore, NotifiedStore};
use crate::adapters::{
    DeliveryReport, FeedProvider, FeishuNotifier, LogNotifier, MarketDataProvider, Notifier,
    TelegramNotifier,
};
use crate::config::{AppConfig, NotifiedBackend, NotifierKind, ScheduleConfig};
use crate::coordination::ShutdownListener;
use crate::domain::{merge_snapshots, BetType, MarketSnapshot, MarketSnapshots};
use crate::error::{LineWatchError, Result};
use crate::persistence::SnapshotStore;

/// What a single cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No previous snapshot existed; the current one was stored
    Bootstrapped,
    Completed(CycleSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub reverse_moves: usize,
    pub disagreements: usize,
    /// Alerts that were not already notified
    pub new_alerts: bool,
    pub delivery: Option<DeliveryReport>,
    /// Rows dropped from the stored snapshots because the game started
    pub expired_rows: usize,
}

/// Driver timing and provider retry policy
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub poll_interval: Duration,
    pub provider_attempts: u32,
    pub provider_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for DriverConfig {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(schedule.poll_interval_secs),
            provider_attempts: schedule.provider_attempts.max(1),
            provider_backoff: Duration::from_secs(schedule.provider_backoff_secs),
        }
    }
}

/// Runs detection cycles against one provider, notifier and state directory
pub struct CycleRunner {
    provider: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    snapshots: SnapshotStore,
    notified: Box<dyn NotifiedStore>,
    detector: LineMovementDetector,
    driver: DriverConfig,
    prune_past_events: bool,
}

impl CycleRunner {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        snapshots: SnapshotStore,
        notified: Box<dyn NotifiedStore>,
        detector: LineMovementDetector,
    ) -> Self {
        Self {
            provider,
            notifier,
            snapshots,
            notified,
            detector,
            driver: DriverConfig::default(),
            prune_past_events: true,
        }
    }

    pub fn with_driver(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    /// Whether notified identifiers of started games are dropped each cycle
    pub fn with_pruning(mut self, prune_past_events: bool) -> Self {
        self.prune_past_events = prune_past_events;
        self
    }

    /// Wire a runner from configuration
    pub fn from_config(
        config: &AppConfig,
        dry_run: bool,
        shutdown: ShutdownListener,
    ) -> Result<Self> {
        let source = config.provider.source().ok_or_else(|| {
            LineWatchError::Validation("no feed_url or feed_path configured".into())
        })?;
        let provider = Arc::new(FeedProvider::new(source, config.provider.timeout())?);
        let notifier = build_notifier(config, dry_run, shutdown)?;
        info!("Alerts go to the {} notifier", notifier.name());

        let storage = &config.storage;
        let snapshots =
            SnapshotStore::new(storage.spread_snapshot_path(), storage.total_snapshot_path());
        let notified = open_notified_store(config)?;

        Ok(Self::new(
            provider,
            notifier,
            snapshots,
            notified,
            LineMovementDetector::new(config.detector.clone()),
        )
        .with_driver(DriverConfig::from(&config.schedule))
        .with_pruning(storage.prune_past_events))
    }

    pub fn notified(&self) -> &dyn NotifiedStore {
        self.notified.as_ref()
    }

    /// Fetch the current snapshots and run one cycle on them
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let current = self.provider.fetch().await?;
        self.process(current).await
    }

    /// Run one cycle on already fetched snapshots
    pub async fn process(&mut self, mut current: MarketSnapshots) -> Result<CycleOutcome> {
        let now = Utc::now();

        if self.prune_past_events {
            let removed = self.notified.prune_before(now);
            if removed > 0 {
                debug!("Dropped {} notified identifiers for started games", removed);
                self.notified.flush()?;
            }
        }

        let previous_spread = self.snapshots.load(BetType::Spread)?;
        let previous_total = self.snapshots.load(BetType::Total)?;
        let (Some(previous_spread), Some(previous_total)) = (previous_spread, previous_total) else {
            info!("No previous snapshots, storing the current market as baseline");
            self.persist(&mut current, now)?;
            return Ok(CycleOutcome::Bootstrapped);
        };
        let previous = MarketSnapshots {
            spread: previous_spread,
            total: previous_total,
        };

        let mut summary = CycleSummary::default();
        let mut texts = Vec::new();

        for bet_type in BetType::ALL {
            let text = self.detect_bet_type(
                bet_type,
                previous.get(bet_type),
                current.get(bet_type),
                &mut summary,
            )?;
            if !text.trim().is_empty() {
                texts.push(text);
            }
        }

        let message = texts.join("\n\n");
        if !message.trim().is_empty() {
            summary.new_alerts = true;
            let report = self.notifier.send(&message).await?;
            if report.chunks_dropped > 0 {
                warn!("{} alert chunks could not be delivered", report.chunks_dropped);
            }
            summary.delivery = Some(report);
        }

        summary.expired_rows = self.persist(&mut current, now)?;

        info!(
            "Cycle done: {} reverse line movements, {} disagreements, new alerts: {}",
            summary.reverse_moves, summary.disagreements, summary.new_alerts
        );
        Ok(CycleOutcome::Completed(summary))
    }

    fn detect_bet_type(
        &mut self,
        bet_type: BetType,
        previous: &MarketSnapshot,
        current: &MarketSnapshot,
        summary: &mut CycleSummary,
    ) -> Result<String> {
        if previous.is_empty() {
            debug!("Previous {} snapshot is empty, skipping detection", bet_type);
            return Ok(String::new());
        }

        let bookmakers = current.real_bookmakers();
        let rows = merge_snapshots(previous, current);
        let detection = self.detector.detect(&rows, bet_type, &bookmakers);
        summary.reverse_moves += detection.reverse_moves.len();
        summary.disagreements += detection.disagreements.len();

        process_and_format(
            self.notified.as_mut(),
            &detection.reverse_moves,
            &detection.disagreements,
        )
    }

    /// Drop started games and store the snapshots for the next cycle
    fn persist(&self, current: &mut MarketSnapshots, now: chrono::DateTime<Utc>) -> Result<usize> {
        let expired: usize = BetType::ALL
            .into_iter()
            .map(|bet_type| current.get_mut(bet_type).retain_upcoming(now))
            .sum();
        self.snapshots.save_all(current)?;
        Ok(expired)
    }

    /// Fetch with bounded attempts and a fixed pause between them
    async fn fetch_with_retry(&self, shutdown: &mut ShutdownListener) -> Result<MarketSnapshots> {
        let attempts = self.driver.provider_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.provider.fetch().await {
                Ok(snapshots) => return Ok(snapshots),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        "Fetch attempt {}/{} failed: {}, retrying in {}s",
                        attempt,
                        attempts,
                        e,
                        self.driver.provider_backoff.as_secs()
                    );
                    if !shutdown.sleep(self.driver.provider_backoff).await {
                        return Err(LineWatchError::Cancelled);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One cycle with provider retry
    pub async fn run_cycle_with_retry(
        &mut self,
        shutdown: &mut ShutdownListener,
    ) -> Result<CycleOutcome> {
        let current = self.fetch_with_retry(shutdown).await?;
        self.process(current).await
    }

    /// Repeat cycles until shutdown. Failed cycles are logged and skipped.
    pub async fn run_loop(&mut self, mut shutdown: ShutdownListener) -> Result<()> {
        info!(
            "Line monitor started, polling every {}s",
            self.driver.poll_interval.as_secs()
        );

        while !shutdown.is_shutdown() {
            let started = Instant::now();

            match self.run_cycle_with_retry(&mut shutdown).await {
                Ok(CycleOutcome::Bootstrapped) => info!("Baseline snapshots stored"),
                Ok(CycleOutcome::Completed(_)) => {}
                Err(LineWatchError::Cancelled) => break,
                Err(e) => error!("Cycle failed: {}", e),
            }

            let wait = self.driver.poll_interval.saturating_sub(started.elapsed());
            if !shutdown.sleep(wait).await {
                break;
            }
        }

        info!("Line monitor stopped");
        Ok(())
    }
}

/// Build the configured notifier. `dry_run` forces the log notifier.
pub fn build_notifier(
    config: &AppConfig,
    dry_run: bool,
    shutdown: ShutdownListener,
) -> Result<Arc<dyn Notifier>> {
    let settings = &config.notifier;
    let kind = if dry_run { NotifierKind::Log } else { settings.kind };
    let chunk_delay = Duration::from_secs(settings.chunk_delay_secs);

    let notifier: Arc<dyn Notifier> = match kind {
        NotifierKind::Telegram => {
            let (Some(token), Some(chat_id)) =
                (&settings.telegram_bot_token, &settings.telegram_chat_id)
            else {
                return Err(LineWatchError::Validation(
                    "telegram notifier needs a bot token and chat id".into(),
                ));
            };
            Arc::new(
                TelegramNotifier::new(token.clone(), chat_id.clone())
                    .with_api_base(settings.telegram_api_base.clone())
                    .with_chunking(settings.max_message_len, chunk_delay)
                    .with_max_retries(settings.max_retries)
                    .with_timeout(config.provider.timeout())?
                    .with_shutdown(shutdown),
            )
        }
        NotifierKind::Feishu => {
            let Some(url) = &settings.feishu_webhook_url else {
                return Err(LineWatchError::Validation(
                    "feishu notifier needs a webhook url".into(),
                ));
            };
            Arc::new(
                FeishuNotifier::new(url.clone())
                    .with_chunking(settings.max_message_len, chunk_delay)
                    .with_shutdown(shutdown),
            )
        }
        NotifierKind::Log => Arc::new(LogNotifier),
    };
    Ok(notifier)
}

/// Open the configured notified store, pruning past games if enabled
pub fn open_notified_store(config: &AppConfig) -> Result<Box<dyn NotifiedStore>> {
    let storage = &config.storage;
    let store: Box<dyn NotifiedStore> = match storage.notified_backend {
        NotifiedBackend::Memory => Box::new(MemoryNotifiedStore::new()),
        NotifiedBackend::Csv if storage.prune_past_events => Box::new(
            CsvNotifiedStore::open_pruned(storage.notified_path(), Utc::now())?,
        ),
        NotifiedBackend::Csv => Box::new(CsvNotifiedStore::open(storage.notified_path())?),
    };
    Ok(store)
}
