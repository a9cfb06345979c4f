//! Odds conversion and raw cell parsing
//!
//! Odds are carried as decimal odds everywhere inside the crate. The feed
//! delivers American odds and percentage strings, which are converted here.

use super::market::BetType;
use crate::error::{LineWatchError, Result};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

static RE_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)%").expect("percent pattern is valid")
});

/// Cells the feed uses for "no quote"
const MISSING_CELLS: [&str; 3] = ["", "N/A", "PK"];

/// Convert American odds to decimal odds.
///
/// Absent input stays absent. Zero has no decimal equivalent and is rejected.
pub fn american_to_decimal(american: Option<Decimal>) -> Result<Option<Decimal>> {
    let Some(american) = american else {
        return Ok(None);
    };

    if american.is_zero() {
        return Err(LineWatchError::InvalidMarketData(
            "American odds of 0 are undefined".into(),
        ));
    }

    let hundred = Decimal::ONE_HUNDRED;
    let decimal = if american > Decimal::ZERO {
        american / hundred + Decimal::ONE
    } else {
        hundred / american.abs() + Decimal::ONE
    };
    Ok(Some(decimal))
}

/// Convert decimal odds to American odds.
///
/// # Panics
/// Panics on decimal odds of exactly 1.0, which have no American equivalent.
pub fn decimal_to_american(decimal: Decimal) -> Decimal {
    assert!(
        decimal != Decimal::ONE,
        "decimal odds of 1.0 have no American equivalent"
    );

    if decimal >= Decimal::TWO {
        (decimal - Decimal::ONE) * Decimal::ONE_HUNDRED
    } else {
        -Decimal::ONE_HUNDRED / (decimal - Decimal::ONE)
    }
}

/// Parse the first `NN%` token of a string into a fraction (`"57%"` -> 0.57)
pub fn percent_to_decimal(raw: Option<&str>) -> Option<Decimal> {
    let caps = RE_PERCENT.captures(raw?)?;
    let whole: i64 = caps.get(1)?.as_str().parse().ok()?;
    Some(Decimal::new(whole, 2))
}

/// Parse an American odds cell (`-110`, `+150`, `even`) into decimal odds.
///
/// Missing or unparseable cells come back as `None`.
pub fn parse_odds_cell(raw: &str) -> Option<Decimal> {
    let cell = raw.trim();
    if MISSING_CELLS.contains(&cell) {
        return None;
    }

    let normalized = cell.to_ascii_lowercase().replace("even", "-100");
    let american = parse_signed(&normalized)?;

    match american_to_decimal(Some(american)) {
        Ok(decimal) => decimal,
        Err(e) => {
            warn!("Dropping odds cell {:?}: {}", raw, e);
            None
        }
    }
}

/// Parse a line cell. Totals use `o`/`u` prefixes for over/under, which
/// become a positive/negative sign.
pub fn parse_line_cell(raw: &str, bet_type: BetType) -> Option<Decimal> {
    let cell = raw.trim();
    if MISSING_CELLS.contains(&cell) {
        return None;
    }

    let normalized = match bet_type {
        BetType::Total => cell.replace(['o', 'O'], "+").replace(['u', 'U'], "-"),
        BetType::Spread => cell.to_string(),
    };
    parse_signed(&normalized)
}

fn parse_signed(cell: &str) -> Option<Decimal> {
    let unsigned = cell.strip_prefix('+').unwrap_or(cell);
    Decimal::from_str(unsigned).ok()
}
