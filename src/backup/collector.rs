//! Consumers of the outcome stream produced by a backup run.

use crate::backup::outcome::BackupOutcome;
use tracing::{error, info};

/// Receives every outcome of a run, in completion order.
pub trait ResultCollector {
    fn collect(&mut self, outcome: BackupOutcome);
}

/// Keeps the raw outcomes.
impl ResultCollector for Vec<BackupOutcome> {
    fn collect(&mut self, outcome: BackupOutcome) {
        self.push(outcome);
    }
}

/// Logs one line per outcome and counts them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogCollector {
    pub succeeded: usize,
    pub failed: usize,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl ResultCollector for LogCollector {
    fn collect(&mut self, outcome: BackupOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
            info!("{outcome}");
        } else {
            self.failed += 1;
            error!("{outcome}");
        }
    }
}
