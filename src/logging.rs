//! Logger capability used for discrepancy reporting
//!
//! Port forwarding reports non-fatal discrepancies (a different assigned
//! port or lifetime) through this capability so the embedding application
//! decides where they go. It is never consulted for control decisions.

use tracing::{info, warn};

/// Sink for human-readable diagnostics
pub trait Logger: Send + Sync {
    /// Log an informational message
    fn info(&self, message: &str);

    /// Log a warning
    fn warn(&self, message: &str);
}

/// Logger forwarding to the `tracing` macros
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}
