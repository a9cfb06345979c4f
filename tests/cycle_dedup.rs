use async_trait::async_trait;
use chrono::{Duration, Utc};
use linewatch::adapters::{DeliveryReport, MarketDataProvider, Notifier};
use linewatch::domain::{BetType, MarketSnapshot, MarketSnapshots, TeamOdds};
use linewatch::error::Result;
use linewatch::persistence::SnapshotStore;
use linewatch::strategy::{
    CsvNotifiedStore, CycleOutcome, CycleRunner, LineMovementDetector, NotifiedStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;

/// Serves whatever snapshots the test put in last
#[derive(Default)]
struct ScriptedProvider {
    next: Mutex<MarketSnapshots>,
}

impl ScriptedProvider {
    fn set(&self, snapshots: MarketSnapshots) {
        *self.next.lock().unwrap() = snapshots;
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    async fn fetch(&self) -> Result<MarketSnapshots> {
        Ok(self.next.lock().unwrap().clone())
    }
}

/// Keeps every text it was asked to send
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, text: &str) -> Result<DeliveryReport> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(DeliveryReport {
            chunks_sent: 1,
            chunks_dropped: 0,
        })
    }
}

fn bookmakers() -> Vec<String> {
    ["Open", "BetMGM", "FanDuel", "Consensus"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Heat spread with money heavy on the Heat and tickets light
fn heat(betmgm_line: Decimal, betmgm_odds: Decimal) -> TeamOdds {
    TeamOdds::new(Utc::now() + Duration::hours(5), "Heat")
        .with_percentages(Some(dec!(0.2)), Some(dec!(0.7)))
        .with_quote("Open", dec!(1.9), dec!(1.91))
        .with_quote("BetMGM", betmgm_line, betmgm_odds)
        .with_quote("FanDuel", dec!(-2.5), dec!(1.87))
        .with_quote("Consensus", dec!(-2.5), dec!(1.9))
}

fn market(spread: Vec<TeamOdds>) -> MarketSnapshots {
    MarketSnapshots {
        spread: MarketSnapshot::new(spread, bookmakers()),
        total: MarketSnapshot::new(vec![], bookmakers()),
    }
}

fn runner(
    dir: &std::path::Path,
    provider: Arc<ScriptedProvider>,
    notifier: Arc<RecordingNotifier>,
) -> CycleRunner {
    let notified = CsvNotifiedStore::open(dir.join("notified_movements.csv")).unwrap();
    CycleRunner::new(
        provider,
        notifier,
        SnapshotStore::in_dir(dir),
        Box::new(notified),
        LineMovementDetector::default(),
    )
}

/// The same disagreement across several cycles is announced exactly once,
/// even after a restart that reloads the notified file.
#[tokio::test]
async fn repeated_disagreement_is_sent_once_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let mut first = runner(dir.path(), provider.clone(), notifier.clone());
    provider.set(market(vec![heat(dec!(-2.5), dec!(2.1))]));
    assert_eq!(assert_ok!(first.run_cycle().await), CycleOutcome::Bootstrapped);
    assert!(notifier.sent().is_empty());

    assert_ok!(first.run_cycle().await);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("Bet on Heat on spread, line: -2.5"));
    assert!(sent[0].contains("- <b>Bookmaker</b>: BetMGM"));
    drop(first);

    // Fresh process, same data directory
    let mut second = runner(dir.path(), provider.clone(), notifier.clone());
    assert_eq!(second.notified().len(), 1);
    assert_ok!(second.run_cycle().await);
    assert_eq!(notifier.sent().len(), 1);
}

/// A new line at the same bookmaker is a new alert
#[tokio::test]
async fn changed_line_is_a_new_alert() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner = runner(dir.path(), provider.clone(), notifier.clone());

    provider.set(market(vec![heat(dec!(-2.5), dec!(2.1))]));
    assert_ok!(runner.run_cycle().await);
    assert_ok!(runner.run_cycle().await);

    provider.set(market(vec![heat(dec!(-3), dec!(2.1))]));
    assert_ok!(runner.run_cycle().await);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("line: -3"));
}

/// Snapshots on disk always hold the latest market, minus started games
#[tokio::test]
async fn snapshot_files_track_latest_market() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner = runner(dir.path(), provider.clone(), notifier.clone());

    let mut started = heat(dec!(-2.5), dec!(2.1));
    started.team = "Bulls".into();
    started.time = Utc::now() - Duration::minutes(1);
    provider.set(market(vec![heat(dec!(-2.5), dec!(2.1)), started]));
    assert_ok!(runner.run_cycle().await);

    let store = SnapshotStore::in_dir(dir.path());
    let spread = store.load(BetType::Spread).unwrap().unwrap();
    assert_eq!(spread.rows.len(), 1);
    assert_eq!(spread.rows[0].team, "Heat");
    assert!(store.load(BetType::Total).unwrap().unwrap().is_empty());
}
