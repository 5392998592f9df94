//! executor/batch.rs
//!
//! Sequential runs of several selected tests.

use tracing::warn;

use super::run::Supervisor;
use crate::error::ExecError;
use crate::logger;
use crate::state::{ExecutionOutcome, TestRecord};

#[derive(Debug)]
pub struct BatchEntry {
    pub record: TestRecord,
    pub outcome: ExecutionOutcome,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub entries: Vec<BatchEntry>,
    /// Set when the runtime could not be started and the batch stopped early.
    pub fatal: Option<ExecError>,
    pub exit_code: i32,
}

impl BatchSummary {
    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.success).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.outcome.success)
    }
}

/// Runs `records` in order, one process at a time. Every failure is recorded
/// and the batch moves on, except a runtime that cannot be started: that
/// would fail every remaining test the same way.
pub fn run_batch(
    supervisor: &Supervisor<'_>,
    records: &[TestRecord],
    mut on_start: impl FnMut(&TestRecord),
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for record in records {
        on_start(record);

        match supervisor.run_test(record) {
            Ok(outcome) => {
                if !outcome.success {
                    summary.exit_code = outcome.exit_code;
                }
                summary.entries.push(BatchEntry {
                    record: record.clone(),
                    outcome,
                });
            }
            Err(e) => {
                summary.entries.push(BatchEntry {
                    record: record.clone(),
                    outcome: ExecutionOutcome::failed(1, String::new(), e.to_string(), e.failure_kind()),
                });
                summary.exit_code = 1;

                if matches!(e, ExecError::Spawn { .. }) {
                    warn!(target: logger::RUNNER, file = %record.file.display(), "aborting batch: {e}");
                    summary.fatal = Some(e);
                    break;
                }
                warn!(target: logger::RUNNER, file = %record.file.display(), "{e}");
            }
        }
    }

    summary
}
