//! CSV persistence of the previous cycle's market snapshot
//!
//! One file per bet type, long format, one record per (team, bookmaker):
//!
//! ```text
//! time,team,bets_pc,money_pc,bookmaker,line,odds
//! ```
//!
//! A team without any quote is written as a single record with empty
//! bookmaker columns so it survives a round trip.

use super::{parse_stored_time, write_all_atomic, write_atomic};
use crate::domain::{BetType, BookmakerQuote, MarketSnapshot, MarketSnapshots, TeamOdds};
use crate::error::{LineWatchError, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

const HEADER: [&str; 7] = ["time", "team", "bets_pc", "money_pc", "bookmaker", "line", "odds"];

/// Reads and writes one snapshot file per bet type
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    spread_path: PathBuf,
    total_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(spread_path: impl Into<PathBuf>, total_path: impl Into<PathBuf>) -> Self {
        Self {
            spread_path: spread_path.into(),
            total_path: total_path.into(),
        }
    }

    /// Store with the default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("spread_snapshot.csv"), dir.join("total_snapshot.csv"))
    }

    pub fn path(&self, bet_type: BetType) -> &Path {
        match bet_type {
            BetType::Spread => &self.spread_path,
            BetType::Total => &self.total_path,
        }
    }

    /// Both snapshot files are present on disk
    pub fn has_all(&self) -> bool {
        BetType::ALL.iter().all(|b| self.path(*b).exists())
    }

    /// Load the snapshot for a bet type. A missing file is `Ok(None)`.
    pub fn load(&self, bet_type: BetType) -> Result<Option<MarketSnapshot>> {
        let path = self.path(bet_type);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = ReaderBuilder::new().flexible(false).from_path(path)?;
        let mut rows: Vec<TeamOdds> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut bookmakers: Vec<String> = Vec::new();

        for record in reader.records() {
            let record = record?;
            let team = field(&record, 1).to_string();
            let Some(time) = parse_stored_time(field(&record, 0)) else {
                warn!(
                    "{}: unreadable time {:?} for {}, record skipped",
                    path.display(),
                    field(&record, 0),
                    team
                );
                continue;
            };

            let slot = *index.entry(team.clone()).or_insert_with(|| {
                rows.push(
                    TeamOdds::new(time, team.clone()).with_percentages(
                        parse_decimal(field(&record, 2)),
                        parse_decimal(field(&record, 3)),
                    ),
                );
                rows.len() - 1
            });

            let bookmaker = field(&record, 4);
            if bookmaker.is_empty() {
                continue;
            }
            let (Some(line), Some(odds)) = (parse_decimal(field(&record, 5)), parse_decimal(field(&record, 6)))
            else {
                warn!("{}: incomplete quote for {} at {}, skipped", path.display(), team, bookmaker);
                continue;
            };

            if !bookmakers.iter().any(|b| b == bookmaker) {
                bookmakers.push(bookmaker.to_string());
            }
            rows[slot].insert_quote(BookmakerQuote {
                bookmaker: bookmaker.to_string(),
                line,
                odds,
            });
        }

        debug!("Loaded {} {} rows from {}", rows.len(), bet_type, path.display());
        Ok(Some(MarketSnapshot::new(rows, bookmakers)))
    }

    /// Replace the snapshot file for a bet type
    pub fn save(&self, bet_type: BetType, snapshot: &MarketSnapshot) -> Result<()> {
        let bytes = encode(snapshot)?;
        let path = self.path(bet_type);
        write_atomic(path, &bytes)?;
        debug!("Saved {} {} rows to {}", snapshot.rows.len(), bet_type, path.display());
        Ok(())
    }

    /// Replace the files of every bet type. A failure leaves all of them
    /// at the previous cycle.
    pub fn save_all(&self, snapshots: &MarketSnapshots) -> Result<()> {
        let spread = encode(&snapshots.spread)?;
        let total = encode(&snapshots.total)?;
        write_all_atomic(&[
            (self.path(BetType::Spread), spread.as_slice()),
            (self.path(BetType::Total), total.as_slice()),
        ])?;
        debug!(
            "Saved {} spread and {} total rows",
            snapshots.spread.rows.len(),
            snapshots.total.rows.len()
        );
        Ok(())
    }
}

fn encode(snapshot: &MarketSnapshot) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for row in &snapshot.rows {
        let time = row.time.to_rfc3339();
        let bets = optional(row.bets_pc);
        let money = optional(row.money_pc);

        // Known bookmakers first in display order, then anything unlisted
        let mut quotes: Vec<&BookmakerQuote> = snapshot
            .bookmakers
            .iter()
            .filter_map(|b| row.quote(b))
            .collect();
        let mut extra: Vec<&BookmakerQuote> = row
            .quotes
            .values()
            .filter(|q| !snapshot.bookmakers.contains(&q.bookmaker))
            .collect();
        extra.sort_by(|a, b| a.bookmaker.cmp(&b.bookmaker));
        quotes.extend(extra);

        if quotes.is_empty() {
            writer.write_record([time.as_str(), row.team.as_str(), bets.as_str(), money.as_str(), "", "", ""])?;
            continue;
        }
        for quote in quotes {
            let line = quote.line.to_string();
            let odds = quote.odds.to_string();
            writer.write_record([
                time.as_str(),
                row.team.as_str(),
                bets.as_str(),
                money.as_str(),
                quote.bookmaker.as_str(),
                line.as_str(),
                odds.as_str(),
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| LineWatchError::Io(e.into_error()))
}

fn field(record: &StringRecord, i: usize) -> &str {
    record.get(i).unwrap_or("").trim()
}

fn optional(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn tip_off() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 30, 0).unwrap()
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        assert!(store.load(BetType::Spread).unwrap().is_none());
        assert!(!store.has_all());
    }

    #[test]
    fn test_save_then_load_keeps_rows_and_bookmaker_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());

        let snapshot = MarketSnapshot::new(
            vec![
                TeamOdds::new(tip_off(), "Lakers")
                    .with_percentages(Some(dec!(0.43)), Some(dec!(0.71)))
                    .with_quote("Open", dec!(-4.5), dec!(1.91))
                    .with_quote("FanDuel", dec!(-5), dec!(1.87))
                    .with_quote("BetMGM", dec!(-5.5), dec!(1.95)),
                TeamOdds::new(tip_off(), "Celtics").with_percentages(None, Some(dec!(0.29))),
            ],
            vec!["Open".into(), "FanDuel".into(), "BetMGM".into()],
        );
        store.save(BetType::Spread, &snapshot).unwrap();

        let loaded = store.load(BetType::Spread).unwrap().unwrap();
        assert_eq!(loaded.bookmakers, vec!["Open", "FanDuel", "BetMGM"]);
        assert_eq!(loaded.rows.len(), 2);

        let lakers = &loaded.rows[0];
        assert_eq!(lakers.time, tip_off());
        assert_eq!(lakers.bets_pc, Some(dec!(0.43)));
        assert_eq!(lakers.quote("BetMGM").unwrap().line, dec!(-5.5));
        assert_eq!(lakers.open_line(), Some(dec!(-4.5)));

        let celtics = &loaded.rows[1];
        assert!(celtics.quotes.is_empty());
        assert_eq!(celtics.bets_pc, None);
        assert_eq!(celtics.money_pc, Some(dec!(0.29)));
    }

    #[test]
    fn test_long_format_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        let snapshot = MarketSnapshot::new(
            vec![TeamOdds::new(tip_off(), "Nets").with_quote("BetMGM", dec!(-215.5), dec!(1.9))],
            vec!["BetMGM".into()],
        );
        store.save(BetType::Total, &snapshot).unwrap();

        let text = std::fs::read_to_string(store.path(BetType::Total)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,team,bets_pc,money_pc,bookmaker,line,odds");
        assert_eq!(lines[1], "2026-03-01T00:30:00+00:00,Nets,,,BetMGM,-215.5,1.9");
    }

    #[test]
    fn test_unreadable_time_skips_only_that_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        std::fs::write(
            store.path(BetType::Spread),
            "time,team,bets_pc,money_pc,bookmaker,line,odds\n\
             yesterday,Heat,,,A,-2.5,1.9\n\
             2026-03-01 00:30:00+00:00,Nets,,0.6,A,3.5,1.95\n",
        )
        .unwrap();

        let loaded = store.load(BetType::Spread).unwrap().unwrap();
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.rows[0].team, "Nets");
        assert_eq!(loaded.rows[0].time, tip_off());
    }

    #[test]
    fn test_save_all_writes_both_bet_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        let snapshots = MarketSnapshots {
            spread: MarketSnapshot::new(
                vec![TeamOdds::new(tip_off(), "Heat").with_quote("A", dec!(-2.5), dec!(1.9))],
                vec!["A".into()],
            ),
            total: MarketSnapshot::new(vec![], vec!["A".into()]),
        };

        store.save_all(&snapshots).unwrap();
        assert!(store.has_all());
        assert_eq!(store.load(BetType::Spread).unwrap().unwrap().rows.len(), 1);
        assert!(store.load(BetType::Total).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_save_all_failure_keeps_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = SnapshotStore::new(dir.path().join("spread.csv"), blocker.join("total.csv"));

        let old = MarketSnapshot::new(
            vec![TeamOdds::new(tip_off(), "Heat").with_quote("A", dec!(-2.5), dec!(1.9))],
            vec!["A".into()],
        );
        store.save(BetType::Spread, &old).unwrap();

        let mut moved = old.clone();
        moved.rows[0] = TeamOdds::new(tip_off(), "Heat").with_quote("A", dec!(-3.5), dec!(1.9));
        let snapshots = MarketSnapshots {
            spread: moved,
            total: MarketSnapshot::new(vec![], vec!["A".into()]),
        };
        assert!(store.save_all(&snapshots).is_err());

        let spread = store.load(BetType::Spread).unwrap().unwrap();
        assert_eq!(spread.rows[0].quote("A").unwrap().line, dec!(-2.5));
    }
}
