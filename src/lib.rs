pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod strategy;

pub use adapters::{FeedProvider, MarketDataProvider, Notifier};
pub use config::AppConfig;
pub use coordination::{shutdown_signal, ShutdownHandle, ShutdownListener};
pub use domain::{BetType, MarketSnapshot, MarketSnapshots, TeamOdds};
pub use error::{LineWatchError, Result};
pub use persistence::SnapshotStore;
pub use strategy::{CycleOutcome, CycleRunner, LineMovementDetector, NotifiedStore};
