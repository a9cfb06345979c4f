//! Signal detectors for sportsbook markets
//!
//! - Line movement detector: reverse line movements and money/bets disagreements

pub mod line_movement;

pub use line_movement::{
    Detection, Disagreement, LineMovementConfig, LineMovementDetector, ReverseLineMovement,
};
