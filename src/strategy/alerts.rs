//! Alert rendering with dedup against the notified store
//!
//! Candidates that were already announced are dropped; new ones are rendered
//! to the chat markup (`<b>`, `<br>`) and recorded in the store.

use super::detectors::{Disagreement, ReverseLineMovement};
use super::idempotency::{notified_identifier, AlertKind, NotifiedStore};
use crate::domain::decimal_to_american;
use crate::error::Result;
use rust_decimal::Decimal;
use tracing::debug;

/// Render every not-yet-notified candidate and record it as notified.
///
/// Returns the alert texts joined by a blank line, or an empty string when
/// nothing is new. The store is flushed before returning.
pub fn process_and_format(
    store: &mut dyn NotifiedStore,
    reverse_moves: &[ReverseLineMovement],
    disagreements: &[Disagreement],
) -> Result<String> {
    let mut messages = Vec::new();

    for rlm in reverse_moves {
        let identifier = notified_identifier(
            &rlm.team,
            rlm.bet_type,
            rlm.line,
            &rlm.best_value_bookmaker,
            AlertKind::ReverseLineMovement,
        );
        if store.contains(&identifier) {
            debug!("Already notified: {}", identifier);
            continue;
        }
        messages.push(format_reverse_move(rlm));
        store.insert(identifier, rlm.time);
    }

    for dg in disagreements {
        let identifier = notified_identifier(
            &dg.team,
            dg.bet_type,
            dg.line,
            &dg.bookmaker,
            AlertKind::Disagreement,
        );
        if store.contains(&identifier) {
            debug!("Already notified: {}", identifier);
            continue;
        }
        messages.push(format_disagreement(dg));
        store.insert(identifier, dg.time);
    }

    store.flush()?;
    Ok(messages.join("\n\n"))
}

pub fn format_reverse_move(rlm: &ReverseLineMovement) -> String {
    format!(
        "<b>Reverse Line Movement Detected for {}</b><br>\n\
         - Best value is with <b>{}</b> offering odds <b>{}</b> on <b>{}</b>, line: <b>{}</b>.",
        rlm.team,
        rlm.best_value_bookmaker,
        rlm.best_value_odds.round_dp(2),
        rlm.bet_type,
        rlm.line
    )
}

pub fn format_disagreement(dg: &Disagreement) -> String {
    let side = if dg.money_on_side() { "on" } else { "against" };
    format!(
        "Bet {side} {team} on {bet_type}, line: {line}\n\
         - <b>Bookmaker</b>: {bookmaker}\n\
         - <b>Odds</b>: {odds} (American: {american})\n\
         - <b>Line</b>: {line}\n\
         - <b>Money Percentage</b>: {money}%\n\
         - <b>Betting Percentage</b>: {bets}%\n\
         - <b>Disagreement</b>: {disagreement}%\n",
        side = side,
        team = dg.team,
        bet_type = dg.bet_type,
        line = dg.line,
        bookmaker = dg.bookmaker,
        odds = dg.odds,
        american = american_display(dg.odds),
        money = dg.money_pc.normalize(),
        bets = dg.bets_pc.normalize(),
        disagreement = dg.disagreement.normalize(),
    )
}

/// Whole-number American odds, or `n/a` for odds with no equivalent
fn american_display(odds: Decimal) -> String {
    if odds <= Decimal::ONE {
        return "n/a".to_string();
    }
    decimal_to_american(odds).round().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{merge_snapshots, BetType, MarketSnapshot, TeamOdds};
    use crate::strategy::detectors::LineMovementDetector;
    use crate::strategy::idempotency::MemoryNotifiedStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn disagreement(money_pc: Decimal) -> Disagreement {
        Disagreement {
            time: Utc::now() + Duration::hours(2),
            team: "Heat".into(),
            bet_type: BetType::Spread,
            bookmaker: "X".into(),
            odds: dec!(2.1),
            line: dec!(-2.5),
            money_pc,
            bets_pc: dec!(20),
            disagreement: money_pc - dec!(20),
            open: Some(dec!(1.9)),
        }
    }

    #[test]
    fn test_reverse_move_message() {
        let rlm = ReverseLineMovement {
            time: Utc::now(),
            team: "Knicks".into(),
            bet_type: BetType::Spread,
            best_value_bookmaker: "A".into(),
            best_value_odds: dec!(1.909090909),
            line: dec!(3.5),
        };
        assert_eq!(
            format_reverse_move(&rlm),
            "<b>Reverse Line Movement Detected for Knicks</b><br>\n\
             - Best value is with <b>A</b> offering odds <b>1.91</b> on <b>spread</b>, line: <b>3.5</b>."
        );
    }

    #[test]
    fn test_disagreement_message() {
        let text = format_disagreement(&disagreement(dec!(70)));
        assert!(text.starts_with("Bet on Heat on spread, line: -2.5\n"));
        assert!(text.contains("- <b>Bookmaker</b>: X\n"));
        assert!(text.contains("- <b>Odds</b>: 2.1 (American: 110)\n"));
        assert!(text.contains("- <b>Money Percentage</b>: 70%\n"));
        assert!(text.contains("- <b>Betting Percentage</b>: 20%\n"));
        assert!(text.contains("- <b>Disagreement</b>: 50%\n"));

        let text = format_disagreement(&disagreement(dec!(45)));
        assert!(text.starts_with("Bet against Heat"));
    }

    #[test]
    fn test_american_display() {
        assert_eq!(american_display(dec!(1.91)), "-110");
        assert_eq!(american_display(dec!(2.5)), "150");
        assert_eq!(american_display(Decimal::ONE), "n/a");
    }

    #[test]
    fn test_second_pass_is_empty() {
        let mut store = MemoryNotifiedStore::new();
        let dgs = vec![disagreement(dec!(70))];

        let first = process_and_format(&mut store, &[], &dgs).unwrap();
        assert!(!first.is_empty());
        assert_eq!(store.len(), 1);

        let second = process_and_format(&mut store, &[], &dgs).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_messages_joined_by_blank_line() {
        let mut store = MemoryNotifiedStore::new();
        let mut other = disagreement(dec!(70));
        other.team = "Magic".into();

        let text = process_and_format(&mut store, &[], &[disagreement(dec!(70)), other]).unwrap();
        assert_eq!(text.matches("\n\nBet on").count(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_detector_then_dedup_twice() {
        let game = Utc::now() + Duration::hours(4);
        let previous = MarketSnapshot::new(
            vec![TeamOdds::new(game, "Knicks")
                .with_percentages(Some(dec!(0.5)), Some(dec!(0.6)))
                .with_quote("A", dec!(3.0), dec!(1.95))
                .with_quote("B", dec!(3.0), dec!(1.85))],
            vec!["A".into(), "B".into()],
        );
        let current = MarketSnapshot::new(
            vec![TeamOdds::new(game, "Knicks")
                .with_percentages(Some(dec!(0.5)), Some(dec!(0.6)))
                .with_quote("A", dec!(3.5), dec!(2.0))
                .with_quote("B", dec!(3.0), dec!(1.8))],
            vec!["A".into(), "B".into()],
        );
        let rows = merge_snapshots(&previous, &current);
        let detection =
            LineMovementDetector::default().detect(&rows, BetType::Spread, &current.real_bookmakers());

        let mut store = MemoryNotifiedStore::new();
        let first =
            process_and_format(&mut store, &detection.reverse_moves, &detection.disagreements).unwrap();
        assert!(first.contains("Reverse Line Movement Detected for Knicks"));
        assert!(store.contains("Knicks_spread_3.5_A_rlm"));

        let second =
            process_and_format(&mut store, &detection.reverse_moves, &detection.disagreements).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_pruning_does_not_hide_new_events() {
        let now = Utc::now();
        let mut store = MemoryNotifiedStore::new();
        store.insert("Heat_spread_-2.5_X_dg".into(), now - Duration::hours(1));
        store.prune_before(now);

        let text = process_and_format(&mut store, &[], &[disagreement(dec!(70))]).unwrap();
        assert!(!text.is_empty());
    }
}
