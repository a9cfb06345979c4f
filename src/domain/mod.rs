pub mod market;
pub mod odds;
pub mod snapshot;

pub use market::*;
pub use odds::{
    american_to_decimal, decimal_to_american, parse_line_cell, parse_odds_cell,
    percent_to_decimal,
};
pub use snapshot::{merge_snapshots, MergedRow};
