//! Non-destructive default backfill for existing documents.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::{classify, ProgressSink};
use crate::operation::{Action, Operation, OperationStatus};
use crate::pacing::Pacer;
use crate::remote::{AdminSurface, PageRequest};

/// Subset of `defaults` whose keys are absent from `document`.
///
/// A key is absent when it is missing or holds `null`. Zero, `false` and the
/// empty string are values and are never replaced.
#[must_use]
pub fn missing_defaults(document: &Map<String, Value>, defaults: &Map<String, Value>) -> Map<String, Value> {
    defaults
        .iter()
        .filter(|(key, _)| document.get(*key).map_or(true, Value::is_null))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Outcome of backfilling one collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    pub collection_id: String,
    /// Documents listed.
    pub scanned: u64,
    /// Documents that already held every default.
    pub untouched: u64,
    /// One entry per attempted patch.
    pub operations: Vec<Operation>,
    /// Set when listing the documents failed part way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
    pub cancelled: bool,
}

impl BackfillReport {
    fn new(collection_id: &str) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn patched(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.status.is_success())
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.operations.iter().filter(|op| op.status.is_failed()).count()
    }
}

/// Scans documents and patches strictly-absent fields with defaults.
pub struct BackfillRunner<'a> {
    surface: &'a dyn AdminSurface,
    pacer: &'a Pacer,
    page_size: u32,
    cancel: CancellationToken,
}

impl<'a> BackfillRunner<'a> {
    #[must_use]
    pub fn new(
        surface: &'a dyn AdminSurface,
        pacer: &'a Pacer,
        page_size: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            surface,
            pacer,
            page_size: page_size.max(1),
            cancel,
        }
    }

    /// Backfill one collection. Failures are recorded, never returned.
    pub async fn backfill(
        &self,
        collection_id: &str,
        defaults: &Map<String, Value>,
        progress: &dyn ProgressSink,
    ) -> BackfillReport {
        let mut report = BackfillReport::new(collection_id);
        if defaults.is_empty() {
            return report;
        }

        let mut offset = 0u64;
        'pages: loop {
            let page = PageRequest {
                limit: self.page_size,
                offset,
            };
            let listed = match self
                .pacer
                .call(collection_id, || self.surface.list_documents(collection_id, page))
                .await
            {
                Ok(listed) => listed,
                Err(e) => {
                    warn!(collection = %collection_id, offset, error = %e, "listing documents failed");
                    report.listing_error = Some(e.to_string());
                    break;
                }
            };

            let received = listed.documents.len() as u64;
            for document in &listed.documents {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'pages;
                }
                report.scanned += 1;

                let patch = missing_defaults(&document.data, defaults);
                if patch.is_empty() {
                    report.untouched += 1;
                    continue;
                }

                let mut operation = Operation::new(
                    Action::BackfillDocument {
                        collection_id: collection_id.to_string(),
                        document_id: document.id.clone(),
                        keys: patch.keys().cloned().collect(),
                    },
                    false,
                );
                let result = self
                    .pacer
                    .call(&document.id, || {
                        self.surface
                            .update_document(collection_id, &document.id, &patch)
                    })
                    .await;
                operation.status = classify(result);
                if let OperationStatus::Failed(cause) = &operation.status {
                    warn!(collection = %collection_id, document = %document.id, cause = %cause, "backfill patch failed");
                } else {
                    debug!(collection = %collection_id, document = %document.id, "patched defaults");
                }
                progress.operation_finished(&operation);
                report.operations.push(operation);
            }

            offset += received;
            if received == 0 || offset >= listed.total {
                break;
            }
        }

        info!(
            collection = %collection_id,
            scanned = report.scanned,
            patched = report.patched(),
            failed = report.failed(),
            "backfill finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::error::RemoteError;
    use crate::executor::NoProgress;
    use crate::remote::{Call, InMemorySurface};
    use serde_json::json;

    fn defaults() -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert("views".into(), json!(0));
        defaults.insert("published".into(), json!(false));
        defaults
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn surface() -> InMemorySurface {
        let surface = InMemorySurface::new();
        surface.seed_collection("posts", "Posts");
        surface.seed_attribute(&{
            let mut a = crate::catalog::AttributeSpec::integer("views");
            a.collection_id = "posts".into();
            a
        });
        surface.seed_attribute(&{
            let mut a = crate::catalog::AttributeSpec::boolean("published");
            a.collection_id = "posts".into();
            a
        });
        surface
    }

    #[test]
    fn test_missing_defaults_treats_null_as_absent() {
        let document = object(json!({"views": null, "published": true}));
        assert_eq!(missing_defaults(&document, &defaults()), object(json!({"views": 0})));
    }

    #[test]
    fn test_falsy_values_are_present() {
        let document = object(json!({"views": 0, "published": false}));
        assert!(missing_defaults(&document, &defaults()).is_empty());
    }

    #[tokio::test]
    async fn test_patches_only_absent_fields() {
        let surface = surface();
        surface.insert_document("posts", "kept", json!({"views": 5, "published": true}));
        surface.insert_document("posts", "partial", json!({"views": 7}));
        surface.insert_document("posts", "bare", json!({}));
        let pacer = Pacer::new(&Timing::immediate());
        let report = BackfillRunner::new(&surface, &pacer, 2, CancellationToken::new())
            .backfill("posts", &defaults(), &NoProgress)
            .await;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.untouched, 1);
        assert_eq!(report.patched(), 2);
        assert_eq!(
            surface.document("posts", "kept").unwrap(),
            object(json!({"views": 5, "published": true}))
        );
        assert_eq!(
            surface.document("posts", "partial").unwrap(),
            object(json!({"views": 7, "published": false}))
        );
        assert_eq!(
            surface.document("posts", "bare").unwrap(),
            object(json!({"views": 0, "published": false}))
        );
    }

    #[tokio::test]
    async fn test_document_failure_does_not_stop_backfill() {
        let surface = surface();
        surface.insert_document("posts", "a", json!({}));
        surface.insert_document("posts", "b", json!({}));
        surface.fail_with(
            Call::UpdateDocument {
                collection: "posts".into(),
                document: "a".into(),
            },
            1,
            || RemoteError::Rejected {
                status: 500,
                message: "boom".into(),
            },
        );
        let pacer = Pacer::new(&Timing::immediate());
        let report = BackfillRunner::new(&surface, &pacer, 100, CancellationToken::new())
            .backfill("posts", &defaults(), &NoProgress)
            .await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.patched(), 1);
        assert_eq!(surface.document("posts", "b").unwrap().get("views"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_listing_failure_is_recorded() {
        let surface = surface();
        surface.fail_with(
            Call::ListDocuments {
                collection: "posts".into(),
                offset: 0,
            },
            2,
            || RemoteError::Timeout,
        );
        let pacer = Pacer::new(&Timing::immediate());
        let report = BackfillRunner::new(&surface, &pacer, 100, CancellationToken::new())
            .backfill("posts", &defaults(), &NoProgress)
            .await;
        assert_eq!(report.listing_error.as_deref(), Some("request timed out"));
        assert!(report.operations.is_empty());
    }

    #[tokio::test]
    async fn test_no_defaults_means_no_calls() {
        let surface = surface();
        let pacer = Pacer::new(&Timing::immediate());
        BackfillRunner::new(&surface, &pacer, 100, CancellationToken::new())
            .backfill("posts", &Map::new(), &NoProgress)
            .await;
        assert!(surface.calls().is_empty());
    }
}
