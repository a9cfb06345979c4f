//! Coordination for long-running operation
//!
//! - Shutdown flag shared by the driver loop and the notifiers
//! - Ctrl+C / SIGTERM handling

pub mod shutdown;

pub use shutdown::{shutdown_signal, ShutdownHandle, ShutdownListener};
