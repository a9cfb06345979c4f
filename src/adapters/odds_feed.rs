//! Market data feed
//!
//! The feed is the per-bet-type table extracted from the odds board: one row
//! per team with the ticket and money split as percentage strings and one
//! raw line/odds cell pair per bookmaker column.
//!
//! ```json
//! {
//!   "spread": {
//!     "bookmakers": ["Open", "BetMGM", "Consensus"],
//!     "rows": [
//!       {"time": "2026-03-01T00:30:00Z", "team": "Lakers",
//!        "bets_pc": "43%", "money_pc": "71%",
//!        "quotes": [{"bookmaker": "BetMGM", "line": "-5.5", "odds": "-110"}]}
//!     ]
//!   },
//!   "total": { ... }
//! }
//! ```

use crate::domain::{
    parse_line_cell, parse_odds_cell, percent_to_decimal, BetType, BookmakerQuote, MarketSnapshot,
    MarketSnapshots, TeamOdds,
};
use crate::error::{LineWatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of current market snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the current snapshot for every tracked bet type
    async fn fetch(&self) -> Result<MarketSnapshots>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuote {
    pub bookmaker: String,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub odds: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub time: Option<String>,
    pub team: String,
    #[serde(default)]
    pub bets_pc: Option<String>,
    #[serde(default)]
    pub money_pc: Option<String>,
    #[serde(default)]
    pub quotes: Vec<RawQuote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub bookmakers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeed {
    #[serde(default)]
    pub spread: RawTable,
    #[serde(default)]
    pub total: RawTable,
}

impl RawFeed {
    pub fn into_snapshots(self) -> MarketSnapshots {
        MarketSnapshots {
            spread: convert_table(self.spread, BetType::Spread),
            total: convert_table(self.total, BetType::Total),
        }
    }
}

/// Convert one extracted table, cleaning every raw cell
pub fn convert_table(table: RawTable, bet_type: BetType) -> MarketSnapshot {
    let mut rows = Vec::with_capacity(table.rows.len());

    for raw in table.rows {
        // A row without a start time is a game already under way
        let Some(time) = raw.time.as_deref().and_then(parse_game_time) else {
            debug!("{}: skipping {} without a start time", bet_type, raw.team);
            continue;
        };

        let mut row = TeamOdds::new(time, raw.team.trim()).with_percentages(
            percent_to_decimal(raw.bets_pc.as_deref()),
            percent_to_decimal(raw.money_pc.as_deref()),
        );

        for quote in raw.quotes {
            let line = quote
                .line
                .as_deref()
                .and_then(|c| parse_line_cell(c, bet_type));
            let odds = quote.odds.as_deref().and_then(parse_odds_cell);
            if let (Some(line), Some(odds)) = (line, odds) {
                row.insert_quote(BookmakerQuote {
                    bookmaker: quote.bookmaker,
                    line,
                    odds,
                });
            }
        }
        rows.push(row);
    }

    MarketSnapshot::new(rows, table.bookmakers)
}

fn parse_game_time(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!("Unparseable game time {:?}: {}", raw, e);
            None
        }
    }
}

/// Where the feed is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    File(PathBuf),
}

/// Reads the extracted feed over HTTP or from a local file
pub struct FeedProvider {
    client: Client,
    source: FeedSource,
}

impl FeedProvider {
    pub fn new(source: FeedSource, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, source })
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    async fn fetch_raw(&self) -> Result<RawFeed> {
        match &self.source {
            FeedSource::Url(url) => {
                debug!("Fetching odds feed from: {}", url);
                let response = self.client.get(url).send().await?;

                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    let msg = format!("Odds feed error {}: {}", status, text);
                    return Err(if status.is_server_error() || status.as_u16() == 429 {
                        LineWatchError::MarketDataUnavailable(msg)
                    } else {
                        LineWatchError::InvalidMarketData(msg)
                    });
                }

                response
                    .json()
                    .await
                    .map_err(|e| LineWatchError::InvalidMarketData(format!("Parse error: {}", e)))
            }
            FeedSource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    LineWatchError::MarketDataUnavailable(format!("{}: {}", path.display(), e))
                })?;
                serde_json::from_str(&text).map_err(|e| {
                    LineWatchError::InvalidMarketData(format!("{}: {}", path.display(), e))
                })
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for FeedProvider {
    async fn fetch(&self) -> Result<MarketSnapshots> {
        let snapshots = self.fetch_raw().await?.into_snapshots();
        info!(
            "Fetched {} spread rows, {} total rows",
            snapshots.spread.rows.len(),
            snapshots.total.rows.len()
        );
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_feed() -> serde_json::Value {
        serde_json::json!({
            "spread": {
                "bookmakers": ["Open", "BetMGM", "FanDuel", "Consensus"],
                "rows": [
                    {
                        "time": "2026-03-01T00:30:00Z",
                        "team": "Lakers",
                        "bets_pc": "43%",
                        "money_pc": "71%",
                        "quotes": [
                            {"bookmaker": "Open", "line": "-4.5", "odds": "-110"},
                            {"bookmaker": "BetMGM", "line": "-5.5", "odds": "+105"},
                            {"bookmaker": "FanDuel", "line": "PK", "odds": "even"}
                        ]
                    },
                    {
                        "time": null,
                        "team": "Celtics",
                        "bets_pc": "57%",
                        "money_pc": "29%",
                        "quotes": []
                    }
                ]
            },
            "total": {
                "bookmakers": ["BetMGM"],
                "rows": [
                    {
                        "time": "2026-03-01T00:30:00Z",
                        "team": "Lakers",
                        "bets_pc": "N/A",
                        "money_pc": "60%",
                        "quotes": [{"bookmaker": "BetMGM", "line": "o221.5", "odds": "-115"}]
                    }
                ]
            }
        })
    }

    #[test]
    fn test_convert_cleans_cells_and_skips_started_games() {
        let feed: RawFeed = serde_json::from_value(sample_feed()).unwrap();
        let snapshots = feed.into_snapshots();

        let spread = &snapshots.spread;
        assert_eq!(spread.rows.len(), 1);
        assert_eq!(spread.real_bookmakers(), vec!["BetMGM", "FanDuel"]);

        let lakers = &spread.rows[0];
        assert_eq!(lakers.bets_pc, Some(dec!(0.43)));
        assert_eq!(lakers.money_pc, Some(dec!(0.71)));
        assert_eq!(lakers.open_line(), Some(dec!(-4.5)));
        assert_eq!(lakers.quote("BetMGM").unwrap().odds, dec!(2.05));
        // PK has no line, so the quote is dropped
        assert!(lakers.quote("FanDuel").is_none());

        let total = &snapshots.total.rows[0];
        assert_eq!(total.bets_pc, None);
        assert_eq!(total.quote("BetMGM").unwrap().line, dec!(221.5));
    }

    #[tokio::test]
    async fn test_fetch_from_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nba/feed.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_feed()))
            .mount(&server)
            .await;

        let provider = FeedProvider::new(
            FeedSource::Url(format!("{}/nba/feed.json", server.uri())),
            Duration::from_secs(5),
        )
        .unwrap();
        let snapshots = provider.fetch().await.unwrap();
        assert_eq!(snapshots.spread.rows[0].team, "Lakers");
        assert_eq!(snapshots.total.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let provider =
            FeedProvider::new(FeedSource::Url(server.uri()), Duration::from_secs(5)).unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let provider =
            FeedProvider::new(FeedSource::Url(server.uri()), Duration::from_secs(5)).unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, LineWatchError::InvalidMarketData(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, sample_feed().to_string()).unwrap();

        let provider = FeedProvider::new(FeedSource::File(path), Duration::from_secs(5)).unwrap();
        let snapshots = provider.fetch().await.unwrap();
        assert_eq!(snapshots.spread.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FeedProvider::new(
            FeedSource::File(dir.path().join("absent.json")),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, LineWatchError::MarketDataUnavailable(_)));
    }
}
