use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Synthetic bookmaker column carrying the opening line
pub const OPEN_BOOKMAKER: &str = "Open";

/// Synthetic bookmaker column carrying the consensus line
pub const CONSENSUS_BOOKMAKER: &str = "Consensus";

/// Columns that look like bookmakers but are not books you can bet at
pub const PSEUDO_BOOKMAKERS: [&str; 2] = [OPEN_BOOKMAKER, CONSENSUS_BOOKMAKER];

/// Bet types the monitor tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Spread,
    Total,
}

impl BetType {
    pub const ALL: [BetType; 2] = [BetType::Spread, BetType::Total];

    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Spread => "spread",
            BetType::Total => "total",
        }
    }
}

impl std::fmt::Display for BetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BetType {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spread" | "spreads" => Ok(BetType::Spread),
            "total" | "totals" => Ok(BetType::Total),
            other => Err(format!("unknown bet type '{}'", other)),
        }
    }
}

/// One bookmaker's line and decimal odds for a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerQuote {
    pub bookmaker: String,
    /// Point spread, or signed total (over positive, under negative)
    pub line: Decimal,
    /// Decimal odds (>= 1.0)
    pub odds: Decimal,
}

/// Observed market state for one team in one polling cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamOdds {
    /// Game start time
    pub time: DateTime<Utc>,
    pub team: String,
    /// Share of tickets on this side, 0..=1
    pub bets_pc: Option<Decimal>,
    /// Share of money on this side, 0..=1
    pub money_pc: Option<Decimal>,
    pub quotes: HashMap<String, BookmakerQuote>,
}

impl TeamOdds {
    pub fn new(time: DateTime<Utc>, team: impl Into<String>) -> Self {
        Self {
            time,
            team: team.into(),
            bets_pc: None,
            money_pc: None,
            quotes: HashMap::new(),
        }
    }

    pub fn with_percentages(mut self, bets_pc: Option<Decimal>, money_pc: Option<Decimal>) -> Self {
        self.bets_pc = bets_pc;
        self.money_pc = money_pc;
        self
    }

    pub fn with_quote(mut self, bookmaker: &str, line: Decimal, odds: Decimal) -> Self {
        self.insert_quote(BookmakerQuote {
            bookmaker: bookmaker.to_string(),
            line,
            odds,
        });
        self
    }

    pub fn insert_quote(&mut self, quote: BookmakerQuote) {
        self.quotes.insert(quote.bookmaker.clone(), quote);
    }

    pub fn quote(&self, bookmaker: &str) -> Option<&BookmakerQuote> {
        self.quotes.get(bookmaker)
    }

    /// Opening line, taken from the synthetic `Open` column
    pub fn open_line(&self) -> Option<Decimal> {
        self.quote(OPEN_BOOKMAKER).map(|q| q.line)
    }
}

/// All team rows for one bet type, as seen in one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub rows: Vec<TeamOdds>,
    /// Bookmaker columns in display order, pseudo bookmakers included
    pub bookmakers: Vec<String>,
}

impl MarketSnapshot {
    pub fn new(rows: Vec<TeamOdds>, bookmakers: Vec<String>) -> Self {
        Self { rows, bookmakers }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bookmakers you can actually bet at, in display order
    pub fn real_bookmakers(&self) -> Vec<String> {
        self.bookmakers
            .iter()
            .filter(|b| !PSEUDO_BOOKMAKERS.contains(&b.as_str()))
            .cloned()
            .collect()
    }

    /// Drop rows for games that already started
    pub fn retain_upcoming(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.time > now);
        before - self.rows.len()
    }
}

/// Current-cycle snapshots for every tracked bet type
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshots {
    pub spread: MarketSnapshot,
    pub total: MarketSnapshot,
}

impl MarketSnapshots {
    pub fn get(&self, bet_type: BetType) -> &MarketSnapshot {
        match bet_type {
            BetType::Spread => &self.spread,
            BetType::Total => &self.total,
        }
    }

    pub fn get_mut(&mut self, bet_type: BetType) -> &mut MarketSnapshot {
        match bet_type {
            BetType::Spread => &mut self.spread,
            BetType::Total => &mut self.total,
        }
    }
}
