//! Line movement detector for sportsbook markets
//!
//! Compares the previous and current state of each team's market and flags
//! two patterns:
//! - Reverse line movement: a book moved its line against the side the
//!   majority of money is on.
//! - Disagreement: money share and ticket share diverge sharply, i.e. a few
//!   large wagers on one side.

use crate::domain::{BetType, MergedRow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for line movement detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineMovementConfig {
    /// Money share above which a side counts as the money majority
    pub money_pivot: Decimal,
    /// Minimum money share minus ticket share to flag a disagreement
    pub disagreement_threshold: Decimal,
    /// Maximum distance between current odds and the opening line for a
    /// later bookmaker to replace the current disagreement pick
    pub opening_band: Decimal,
}

impl Default for LineMovementConfig {
    fn default() -> Self {
        Self {
            money_pivot: Decimal::new(5, 1),            // 0.5
            disagreement_threshold: Decimal::new(4, 1), // 0.4
            opening_band: Decimal::ONE,
        }
    }
}

/// A line that moved against the money, with the best current price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseLineMovement {
    /// Game start time
    pub time: DateTime<Utc>,
    pub team: String,
    pub bet_type: BetType,
    pub best_value_bookmaker: String,
    /// Decimal odds at the best value bookmaker
    pub best_value_odds: Decimal,
    pub line: Decimal,
}

/// Money and tickets pulling in different directions at one bookmaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disagreement {
    /// Game start time
    pub time: DateTime<Utc>,
    pub team: String,
    pub bet_type: BetType,
    pub bookmaker: String,
    /// Decimal odds, rounded to 2 dp
    pub odds: Decimal,
    pub line: Decimal,
    /// Money share in percent (0-100)
    pub money_pc: Decimal,
    /// Ticket share in percent (0-100)
    pub bets_pc: Decimal,
    /// Money minus tickets in percent, rounded to 2 dp
    pub disagreement: Decimal,
    /// Opening line from the `Open` column
    pub open: Option<Decimal>,
}

impl Disagreement {
    /// Money is on this side (as opposed to against it)
    pub fn money_on_side(&self) -> bool {
        self.money_pc > Decimal::new(50, 0)
    }
}

/// Candidates found in one pass over a bet type
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub reverse_moves: Vec<ReverseLineMovement>,
    pub disagreements: Vec<Disagreement>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.reverse_moves.is_empty() && self.disagreements.is_empty()
    }
}

#[derive(Debug)]
struct ValuePick<'a> {
    bookmaker: &'a str,
    odds: Decimal,
    line: Decimal,
}

#[derive(Debug)]
struct DisagreementPick<'a> {
    bookmaker: &'a str,
    odds: Decimal,
    line: Decimal,
    disagreement: Decimal,
}

/// Stateless detector over merged old/new rows
#[derive(Debug, Clone, Default)]
pub struct LineMovementDetector {
    config: LineMovementConfig,
}

impl LineMovementDetector {
    pub fn new(config: LineMovementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LineMovementConfig {
        &self.config
    }

    /// Scan merged rows of one bet type.
    ///
    /// `bookmakers` must already exclude the `Open`/`Consensus` columns;
    /// its order decides ties.
    pub fn detect(&self, rows: &[MergedRow], bet_type: BetType, bookmakers: &[String]) -> Detection {
        let mut detection = Detection::default();

        for row in rows {
            // No money split means no signal
            let (Some(money_pc), Some(time)) = (row.money_pc_new(), row.time_new()) else {
                continue;
            };
            let bets_pc = row.bets_pc_new();
            let opening = row.open_line_new();

            let mut any_unchanged = false;
            let mut best_value: Option<ValuePick> = None;
            let mut best_disagreement: Option<DisagreementPick> = None;

            for bookmaker in bookmakers {
                let new_line = row.line_new(bookmaker);
                let new_odds = row.odds_new(bookmaker);

                if let (Some(old), Some(new)) = (row.line_old(bookmaker), new_line) {
                    if old == new {
                        any_unchanged = true;
                    }

                    if let Some(odds) = new_odds {
                        let better = best_value.as_ref().map_or(true, |b| odds > b.odds);
                        if self.is_reverse_move(money_pc, old, new) && better {
                            best_value = Some(ValuePick {
                                bookmaker: bookmaker.as_str(),
                                odds,
                                line: new,
                            });
                        }
                    }
                }

                let (Some(bets_pc), Some(odds), Some(line)) = (bets_pc, new_odds, new_line) else {
                    continue;
                };
                let disagreement = money_pc - bets_pc;
                if disagreement <= self.config.disagreement_threshold {
                    continue;
                }

                let replace = match &best_disagreement {
                    None => true,
                    Some(best) => {
                        odds > best.odds
                            && disagreement > best.disagreement
                            && self.within_opening_band(odds, opening)
                    }
                };
                if replace {
                    best_disagreement = Some(DisagreementPick {
                        bookmaker: bookmaker.as_str(),
                        odds,
                        line,
                        disagreement,
                    });
                }
            }

            if let Some(pick) = best_disagreement {
                let hundred = Decimal::ONE_HUNDRED;
                let candidate = Disagreement {
                    time,
                    team: row.team.clone(),
                    bet_type,
                    bookmaker: pick.bookmaker.to_string(),
                    odds: pick.odds.round_dp(2),
                    line: pick.line,
                    money_pc: money_pc * hundred,
                    bets_pc: bets_pc.unwrap_or_default() * hundred,
                    disagreement: (pick.disagreement * hundred).round_dp(2),
                    open: opening,
                };
                debug!(
                    "Disagreement: {} {} at {} ({}% money vs {}% bets)",
                    candidate.team,
                    bet_type,
                    candidate.bookmaker,
                    candidate.money_pc,
                    candidate.bets_pc
                );
                detection.disagreements.push(candidate);
            }

            // Gate on any book holding its line, report the best-priced mover
            if any_unchanged {
                if let Some(pick) = best_value {
                    let candidate = ReverseLineMovement {
                        time,
                        team: row.team.clone(),
                        bet_type,
                        best_value_bookmaker: pick.bookmaker.to_string(),
                        best_value_odds: pick.odds,
                        line: pick.line,
                    };
                    debug!(
                        "Reverse line movement: {} {} best at {} ({})",
                        candidate.team, bet_type, candidate.best_value_bookmaker, candidate.line
                    );
                    detection.reverse_moves.push(candidate);
                }
            }
        }

        if !detection.is_empty() {
            info!(
                "{}: {} reverse line movements, {} disagreements across {} rows",
                bet_type,
                detection.reverse_moves.len(),
                detection.disagreements.len(),
                rows.len()
            );
        }

        detection
    }

    /// Line moved opposite to where the money majority is
    fn is_reverse_move(&self, money_pc: Decimal, old_line: Decimal, new_line: Decimal) -> bool {
        let pivot = self.config.money_pivot;
        (money_pc > pivot && new_line > old_line) || (money_pc < pivot && new_line < old_line)
    }

    fn within_opening_band(&self, odds: Decimal, opening: Option<Decimal>) -> bool {
        opening.map_or(false, |open| (odds - open).abs() <= self.config.opening_band)
    }
}
