//! Run orchestration: probe, plan, apply, propagation wait, backfill, report.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backfill::{BackfillReport, BackfillRunner};
use crate::catalog::Catalog;
use crate::config::{SyncConfig, Timing};
use crate::error::SyncResult;
use crate::executor::{MutationExecutor, NoProgress, ProgressSink};
use crate::operation::{Action, Operation, OperationKind, OperationStatus};
use crate::pacing::Pacer;
use crate::planner;
use crate::probe::RemoteStateProbe;
use crate::remote::{AdminSurface, HttpAdminClient};
use crate::report::RunReport;

/// Whether a catalog collection exists remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Present,
    Missing,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Present => write!(f, "present"),
            Presence::Missing => write!(f, "missing"),
        }
    }
}

/// Presence of one catalog collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStatus {
    pub id: String,
    pub name: String,
    pub presence: Presence,
}

/// Entry point for callers: status queries and full runs.
pub struct Reconciler {
    catalog: Catalog,
    surface: Arc<dyn AdminSurface>,
    timing: Timing,
    page_size: u32,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressSink>,
    skip_backfill: bool,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("collections", &self.catalog.collections().len())
            .field("timing", &self.timing)
            .field("page_size", &self.page_size)
            .field("skip_backfill", &self.skip_backfill)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(catalog: Catalog, surface: Arc<dyn AdminSurface>, config: &SyncConfig) -> Self {
        Self {
            catalog,
            surface,
            timing: config.timing.clone(),
            page_size: config.page_size,
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
            skip_backfill: false,
        }
    }

    /// Reconciler talking to the hosted surface over HTTPS.
    pub fn connect(catalog: Catalog, config: &SyncConfig) -> SyncResult<Self> {
        let client = HttpAdminClient::new(config)?;
        Ok(Self::new(catalog, Arc::new(client), config))
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn skip_backfill(mut self, skip: bool) -> Self {
        self.skip_backfill = skip;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Present/missing for every catalog collection.
    pub async fn schema_status(&self) -> SyncResult<Vec<CollectionStatus>> {
        let pacer = Pacer::new(&self.timing);
        let remote: HashSet<String> =
            RemoteStateProbe::new(self.surface.as_ref(), &pacer, self.page_size)
                .list_collections()
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();

        Ok(self
            .catalog
            .collections()
            .iter()
            .map(|c| CollectionStatus {
                id: c.id.clone(),
                name: c.name.clone(),
                presence: if remote.contains(&c.id) {
                    Presence::Present
                } else {
                    Presence::Missing
                },
            })
            .collect())
    }

    /// Probe and plan without applying anything.
    pub async fn plan(&self) -> SyncResult<Vec<Operation>> {
        let pacer = Pacer::new(&self.timing);
        let snapshot = RemoteStateProbe::new(self.surface.as_ref(), &pacer, self.page_size)
            .list_existing(&self.catalog)
            .await?;
        Ok(planner::plan(&self.catalog, &snapshot))
    }

    /// Full run. Only probe failures abort; everything else ends up in the
    /// report.
    pub async fn run(&self) -> SyncResult<RunReport> {
        let started_at = Utc::now();
        let pacer = Pacer::new(&self.timing);
        let surface = self.surface.as_ref();

        let snapshot = RemoteStateProbe::new(surface, &pacer, self.page_size)
            .list_existing(&self.catalog)
            .await?;
        let operations = planner::plan(&self.catalog, &snapshot);
        info!(operations = operations.len(), "planned schema operations");

        let operations = MutationExecutor::new(surface, &pacer, self.timing.settle, self.cancel.clone())
            .apply(operations, self.progress.as_ref())
            .await;

        let mut backfill = Vec::new();
        if self.skip_backfill {
            info!("backfill skipped");
        } else if !self.cancel.is_cancelled() {
            backfill = self.backfill(&operations, &pacer).await;
        }

        let report = RunReport::finish(started_at, operations, backfill, self.cancel.is_cancelled());
        info!(success = report.success, cancelled = report.cancelled, "run finished");
        Ok(report)
    }

    async fn backfill(&self, operations: &[Operation], pacer: &Pacer) -> Vec<BackfillReport> {
        let attributes_created = operations.iter().any(|op| {
            op.kind() == OperationKind::CreateAttribute && op.status == OperationStatus::Applied
        });
        if attributes_created && !self.timing.propagation_wait.is_zero() {
            info!(
                wait_ms = u64::try_from(self.timing.propagation_wait.as_millis()).unwrap_or(u64::MAX),
                "waiting for new attributes to propagate"
            );
            tokio::time::sleep(self.timing.propagation_wait).await;
        }

        let runner = BackfillRunner::new(
            self.surface.as_ref(),
            pacer,
            self.page_size,
            self.cancel.clone(),
        );
        let mut reports = Vec::new();
        for collection in self.catalog.collections() {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(defaults) = backfill_defaults(&self.catalog, &collection.id, operations)
            else {
                continue;
            };
            if defaults.is_empty() {
                continue;
            }
            reports.push(
                runner
                    .backfill(&collection.id, &defaults, self.progress.as_ref())
                    .await,
            );
        }
        reports
    }
}

/// Defaults to backfill for a collection, or `None` when the collection is
/// skipped: created in this run (nothing to backfill) or not created at all.
/// Defaults of attributes that were not created are withheld.
fn backfill_defaults(
    catalog: &Catalog,
    collection_id: &str,
    operations: &[Operation],
) -> Option<Map<String, Value>> {
    let mut unavailable = HashSet::new();
    for operation in operations
        .iter()
        .filter(|op| op.action.collection_id() == collection_id)
    {
        match (&operation.action, &operation.status) {
            (Action::CreateCollection(_), OperationStatus::AlreadyExists) => {}
            (Action::CreateCollection(_), status) => {
                if !status.is_success() {
                    warn!(collection = %collection_id, "collection missing, skipping backfill");
                }
                return None;
            }
            (Action::CreateAttribute(spec), status) if !status.is_success() => {
                unavailable.insert(spec.key.as_str());
            }
            _ => {}
        }
    }

    let mut defaults = catalog.defaults_for(collection_id);
    defaults.retain(|key, _| !unavailable.contains(key.as_str()));
    Some(defaults)
}
