//! Detection, dedup and cycle orchestration
//!
//! - `detectors/` - Line movement detection over merged snapshots
//! - `idempotency` - Notified set that keeps alerts from repeating
//! - `alerts` - Rendering of new alerts
//! - `orchestrator` - One monitoring cycle and the driver loop

pub mod alerts;
pub mod detectors;
pub mod idempotency;
pub mod orchestrator;

pub use alerts::{format_disagreement, format_reverse_move, process_and_format};
pub use detectors::{
    Detection, Disagreement, LineMovementConfig, LineMovementDetector, ReverseLineMovement,
};
pub use idempotency::{
    notified_identifier, AlertKind, CsvNotifiedStore, MemoryNotifiedStore, NotifiedStore,
};
pub use orchestrator::{
    build_notifier, open_notified_store, CycleOutcome, CycleRunner, CycleSummary, DriverConfig,
};
