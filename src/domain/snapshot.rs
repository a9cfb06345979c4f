//! Merge of two consecutive snapshots into old/new rows
//!
//! The merge is a full outer join on team name. A team present on only one
//! side keeps its row with the other side absent, so both newly listed and
//! newly removed games survive.

use super::market::{MarketSnapshot, TeamOdds};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::warn;

/// One team's previous and current market state
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub team: String,
    pub old: Option<TeamOdds>,
    pub new: Option<TeamOdds>,
}

impl MergedRow {
    pub fn time_old(&self) -> Option<DateTime<Utc>> {
        self.old.as_ref().map(|r| r.time)
    }

    pub fn time_new(&self) -> Option<DateTime<Utc>> {
        self.new.as_ref().map(|r| r.time)
    }

    pub fn money_pc_new(&self) -> Option<Decimal> {
        self.new.as_ref().and_then(|r| r.money_pc)
    }

    pub fn bets_pc_new(&self) -> Option<Decimal> {
        self.new.as_ref().and_then(|r| r.bets_pc)
    }

    pub fn open_line_new(&self) -> Option<Decimal> {
        self.new.as_ref().and_then(|r| r.open_line())
    }

    pub fn line_old(&self, bookmaker: &str) -> Option<Decimal> {
        self.old.as_ref()?.quote(bookmaker).map(|q| q.line)
    }

    pub fn line_new(&self, bookmaker: &str) -> Option<Decimal> {
        self.new.as_ref()?.quote(bookmaker).map(|q| q.line)
    }

    pub fn odds_new(&self, bookmaker: &str) -> Option<Decimal> {
        self.new.as_ref()?.quote(bookmaker).map(|q| q.odds)
    }
}

/// Outer-join two snapshots on team name. Rows come back sorted by team.
pub fn merge_snapshots(previous: &MarketSnapshot, current: &MarketSnapshot) -> Vec<MergedRow> {
    let mut merged: BTreeMap<String, MergedRow> = BTreeMap::new();

    for row in &previous.rows {
        let entry = merged.entry(row.team.clone()).or_insert_with(|| MergedRow {
            team: row.team.clone(),
            old: None,
            new: None,
        });
        if entry.old.replace(row.clone()).is_some() {
            warn!("Duplicate team '{}' in previous snapshot, keeping last", row.team);
        }
    }

    for row in &current.rows {
        let entry = merged.entry(row.team.clone()).or_insert_with(|| MergedRow {
            team: row.team.clone(),
            old: None,
            new: None,
        });
        if entry.new.replace(row.clone()).is_some() {
            warn!("Duplicate team '{}' in current snapshot, keeping last", row.team);
        }
    }

    merged.into_values().collect()
}
