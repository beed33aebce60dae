//! # Folio Schema
//!
//! Schema reconciliation and default backfill for the portfolio site's hosted
//! document database.
//!
//! A run brings the remote schema up to a declarative [`Catalog`]:
//!
//! 1. [`RemoteStateProbe`] takes one snapshot of what exists remotely.
//! 2. [`planner::plan`] diffs catalog and snapshot into ordered operations
//!    (collection, then its attributes, then its indexes).
//! 3. [`MutationExecutor`] applies them one at a time, treating duplicates as
//!    success and recording failures without stopping.
//! 4. [`BackfillRunner`] patches strictly-absent fields of existing documents
//!    with catalog defaults.
//! 5. Everything folds into a [`RunReport`].
//!
//! Re-running against an up-to-date database is a no-op.
//!
//! ## Example
//!
//! ```ignore
//! use folio_schema::prelude::*;
//!
//! let config = SyncConfig::from_env(&BUILTIN_COLLECTIONS)?;
//! let catalog = Catalog::builtin(&config)?;
//! let reconciler = Reconciler::connect(catalog, &config)?;
//!
//! for status in reconciler.schema_status().await? {
//!     println!("{}: {}", status.name, status.presence);
//! }
//!
//! let report = reconciler.run().await?;
//! println!("{report}");
//! ```
//!
//! ## Crate Organization
//!
//! - [`catalog`] - Desired-state types, built-in catalog, YAML loading
//! - [`remote`] - [`AdminSurface`] trait, HTTPS client, in-memory surface
//!   (`test-util` feature)
//! - [`config`] - Environment-driven configuration and timing
//! - [`error`] - Fatal and per-call error types

pub mod backfill;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod operation;
pub mod pacing;
pub mod pipeline;
pub mod planner;
pub mod probe;
pub mod remote;
pub mod report;

pub use backfill::{BackfillReport, BackfillRunner};
pub use catalog::Catalog;
pub use executor::MutationExecutor;
pub use pipeline::Reconciler;
pub use probe::RemoteStateProbe;
pub use remote::AdminSurface;
pub use report::RunReport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backfill::{missing_defaults, BackfillReport, BackfillRunner};
    pub use crate::catalog::{
        AttributeKind, AttributeSpec, Catalog, CollectionSpec, DefaultValue, IndexKind,
        IndexOrder, IndexSpec, BUILTIN_COLLECTIONS,
    };
    pub use crate::config::{ConfigError, SyncConfig, Timing};
    pub use crate::error::{RemoteError, RemoteResult, SyncError, SyncResult};
    pub use crate::executor::{MutationExecutor, NoProgress, ProgressSink};
    pub use crate::operation::{Action, Operation, OperationKind, OperationStatus};
    pub use crate::pacing::Pacer;
    pub use crate::pipeline::{CollectionStatus, Presence, Reconciler};
    pub use crate::planner::plan;
    pub use crate::probe::{RemoteSnapshot, RemoteStateProbe};
    pub use crate::remote::{
        AdminSurface, AttributePage, CollectionPage, Document, DocumentPage, HttpAdminClient,
        IndexPage, PageRequest, RemoteAttribute, RemoteCollection, RemoteIndex,
    };
    #[cfg(any(test, feature = "test-util"))]
    pub use crate::remote::{Call, InMemorySurface};
    pub use crate::report::{KindCounts, RunReport};
}
