//! Applies planned operations against the administrative surface.
//!
//! Operations run strictly one at a time in plan order. Each outcome is
//! classified and recorded on the operation; a failure never stops the loop.
//! Dependents of a failed collection or attribute are marked failed without a
//! remote call and lose their criticality, which stays with the failed
//! prerequisite. Dependents of a freshly created one wait out the settle
//! interval first.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RemoteResult;
use crate::operation::{Action, Operation, OperationStatus};
use crate::pacing::Pacer;
use crate::remote::AdminSurface;

/// Receives every operation once it has been attempted.
pub trait ProgressSink: Send + Sync {
    fn operation_finished(&self, operation: &Operation);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn operation_finished(&self, _operation: &Operation) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&Operation) + Send + Sync,
{
    fn operation_finished(&self, operation: &Operation) {
        self(operation);
    }
}

/// Turn a call result into an operation status.
pub(crate) fn classify(result: RemoteResult<()>) -> OperationStatus {
    match result {
        Ok(()) => OperationStatus::Applied,
        Err(e) if e.is_already_exists() => OperationStatus::AlreadyExists,
        Err(e) => OperationStatus::Failed(e.to_string()),
    }
}

/// Readiness of prerequisites created earlier in the same run.
#[derive(Debug, Default)]
struct Prerequisites {
    /// When a freshly created object becomes usable by dependents.
    ready_at: HashMap<String, Instant>,
    failed: HashSet<String>,
}

impl Prerequisites {
    fn collection_key(collection_id: &str) -> String {
        collection_id.to_string()
    }

    fn attribute_key(collection_id: &str, key: &str) -> String {
        format!("{collection_id}.{key}")
    }

    /// Prerequisite keys of an operation.
    fn of(action: &Action) -> Vec<String> {
        match action {
            Action::CreateCollection(_) | Action::BackfillDocument { .. } => Vec::new(),
            Action::CreateAttribute(spec) => vec![Self::collection_key(&spec.collection_id)],
            Action::CreateIndex(spec) => std::iter::once(Self::collection_key(&spec.collection_id))
                .chain(
                    spec.attributes
                        .iter()
                        .map(|key| Self::attribute_key(&spec.collection_id, key)),
                )
                .collect(),
        }
    }

    /// Key under which dependents find this operation.
    fn provided_by(action: &Action) -> Option<String> {
        match action {
            Action::CreateCollection(spec) => Some(Self::collection_key(&spec.id)),
            Action::CreateAttribute(spec) => {
                Some(Self::attribute_key(&spec.collection_id, &spec.key))
            }
            Action::CreateIndex(_) | Action::BackfillDocument { .. } => None,
        }
    }

    fn first_failed<'k>(&self, keys: &'k [String]) -> Option<&'k str> {
        keys.iter()
            .find(|k| self.failed.contains(*k))
            .map(String::as_str)
    }

    fn latest_ready(&self, keys: &[String]) -> Option<Instant> {
        keys.iter().filter_map(|k| self.ready_at.get(k)).max().copied()
    }

    fn record(&mut self, action: &Action, status: &OperationStatus, settle: Duration) {
        let Some(key) = Self::provided_by(action) else {
            return;
        };
        match status {
            OperationStatus::Applied => {
                self.ready_at.insert(key, Instant::now() + settle);
            }
            OperationStatus::Failed(_) => {
                self.failed.insert(key);
            }
            OperationStatus::AlreadyExists | OperationStatus::Pending => {}
        }
    }
}

/// Applies schema operations in order.
pub struct MutationExecutor<'a> {
    surface: &'a dyn AdminSurface,
    pacer: &'a Pacer,
    settle: Duration,
    cancel: CancellationToken,
}

impl<'a> MutationExecutor<'a> {
    #[must_use]
    pub fn new(
        surface: &'a dyn AdminSurface,
        pacer: &'a Pacer,
        settle: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            surface,
            pacer,
            settle,
            cancel,
        }
    }

    /// Apply `operations` in order and return them with their outcomes.
    ///
    /// Cancellation is honored between operations; anything not reached
    /// stays `Pending`.
    pub async fn apply(
        &self,
        mut operations: Vec<Operation>,
        progress: &dyn ProgressSink,
    ) -> Vec<Operation> {
        let mut prerequisites = Prerequisites::default();

        for operation in &mut operations {
            if self.cancel.is_cancelled() {
                warn!("run cancelled, leaving remaining operations pending");
                break;
            }

            let required = Prerequisites::of(&operation.action);
            operation.status = if let Some(missing) = prerequisites.first_failed(&required) {
                operation.critical = false;
                OperationStatus::Failed(format!("prerequisite failed: {missing}"))
            } else {
                if let Some(ready_at) = prerequisites.latest_ready(&required) {
                    if Instant::now() < ready_at {
                        debug!(operation = %operation, "waiting for prerequisite to settle");
                        sleep_until(ready_at).await;
                    }
                }
                self.issue(&operation.action).await
            };

            prerequisites.record(&operation.action, &operation.status, self.settle);
            match &operation.status {
                OperationStatus::Applied => info!(operation = %operation, "applied"),
                OperationStatus::AlreadyExists => debug!(operation = %operation, "already exists"),
                OperationStatus::Failed(cause) => {
                    warn!(operation = %operation, cause = %cause, "operation failed");
                }
                OperationStatus::Pending => {}
            }
            progress.operation_finished(operation);
        }

        operations
    }

    async fn issue(&self, action: &Action) -> OperationStatus {
        let surface = self.surface;
        let result = match action {
            Action::CreateCollection(spec) => {
                self.pacer
                    .call(&spec.id, || surface.create_collection(spec))
                    .await
            }
            Action::CreateAttribute(spec) => {
                self.pacer
                    .call(&spec.key, || surface.create_attribute(spec))
                    .await
            }
            Action::CreateIndex(spec) => {
                self.pacer
                    .call(&spec.key, || surface.create_index(spec))
                    .await
            }
            Action::BackfillDocument { .. } => {
                return OperationStatus::Failed("not a schema operation".to_string());
            }
        };
        classify(result)
    }
}
