//! Run summary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backfill::BackfillReport;
use crate::operation::{Operation, OperationKind, OperationStatus};

/// Outcome counts for one operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub applied: usize,
    pub already_exists: usize,
    pub failed: usize,
    /// Not reached because the run was cancelled.
    pub pending: usize,
}

impl KindCounts {
    fn add(&mut self, status: &OperationStatus) {
        match status {
            OperationStatus::Applied => self.applied += 1,
            OperationStatus::AlreadyExists => self.already_exists += 1,
            OperationStatus::Failed(_) => self.failed += 1,
            OperationStatus::Pending => self.pending += 1,
        }
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// False when a critical operation failed or the run was cancelled.
    pub success: bool,
    pub cancelled: bool,
    pub counts: BTreeMap<OperationKind, KindCounts>,
    /// Schema operations in execution order.
    pub operations: Vec<Operation>,
    /// One entry per backfilled collection.
    pub backfill: Vec<BackfillReport>,
}

impl RunReport {
    /// Fold finished operations into a report.
    #[must_use]
    pub fn finish(
        started_at: DateTime<Utc>,
        operations: Vec<Operation>,
        backfill: Vec<BackfillReport>,
        cancelled: bool,
    ) -> Self {
        let mut counts: BTreeMap<OperationKind, KindCounts> = OperationKind::ALL
            .iter()
            .map(|kind| (*kind, KindCounts::default()))
            .collect();
        let all = operations
            .iter()
            .chain(backfill.iter().flat_map(|b| b.operations.iter()));
        for operation in all {
            counts
                .entry(operation.kind())
                .or_default()
                .add(&operation.status);
        }

        let cancelled = cancelled
            || operations
                .iter()
                .any(|op| op.status == OperationStatus::Pending)
            || backfill.iter().any(|b| b.cancelled);
        let critical_failure = operations
            .iter()
            .any(|op| op.critical && op.status.is_failed());

        Self {
            started_at,
            finished_at: Utc::now(),
            success: !cancelled && !critical_failure,
            cancelled,
            counts,
            operations,
            backfill,
        }
    }

    /// Every operation of the run, schema first, then backfill.
    pub fn all_operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations
            .iter()
            .chain(self.backfill.iter().flat_map(|b| b.operations.iter()))
    }

    /// Failed operations with their causes.
    #[must_use]
    pub fn failed(&self) -> Vec<&Operation> {
        self.all_operations()
            .filter(|op| op.status.is_failed())
            .collect()
    }

    #[must_use]
    pub fn counts_for(&self, kind: OperationKind) -> KindCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "Run finished in {:.1}s",
            elapsed.num_milliseconds() as f64 / 1000.0
        )?;
        for (kind, counts) in &self.counts {
            writeln!(
                f,
                "  {:<18} applied {:>3}  already exists {:>3}  failed {:>3}",
                kind.to_string(),
                counts.applied,
                counts.already_exists,
                counts.failed
            )?;
        }

        for backfill in &self.backfill {
            if let Some(error) = &backfill.listing_error {
                writeln!(
                    f,
                    "  backfill of {} stopped early: {error}",
                    backfill.collection_id
                )?;
            }
        }

        let failed = self.failed();
        if !failed.is_empty() {
            writeln!(f, "Failed operations:")?;
            for operation in failed {
                let marker = if operation.critical { " (required)" } else { "" };
                writeln!(f, "  - {operation}{marker}: {}", operation.status.cause().unwrap_or_default())?;
            }
        }

        let verdict = if self.cancelled {
            "cancelled"
        } else if self.success {
            "success"
        } else {
            "failed"
        };
        write!(f, "Result: {verdict}")
    }
}
