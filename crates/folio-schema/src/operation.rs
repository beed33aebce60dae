//! Planned operations and their outcomes.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::catalog::{AttributeSpec, CollectionSpec, IndexSpec};

/// Kind of an operation, used for per-kind counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateCollection,
    CreateAttribute,
    CreateIndex,
    BackfillDocument,
}

impl OperationKind {
    /// Every kind, in pipeline order.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::CreateCollection,
        OperationKind::CreateAttribute,
        OperationKind::CreateIndex,
        OperationKind::BackfillDocument,
    ];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::CreateCollection => write!(f, "create collection"),
            OperationKind::CreateAttribute => write!(f, "create attribute"),
            OperationKind::CreateIndex => write!(f, "create index"),
            OperationKind::BackfillDocument => write!(f, "backfill document"),
        }
    }
}

/// What an operation does, with the catalog entry it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The spec carries no attributes or indexes; those get their own operations.
    CreateCollection(CollectionSpec),
    CreateAttribute(AttributeSpec),
    CreateIndex(IndexSpec),
    BackfillDocument {
        collection_id: String,
        document_id: String,
        /// Keys set by the patch.
        keys: Vec<String>,
    },
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Action::CreateCollection(_) => OperationKind::CreateCollection,
            Action::CreateAttribute(_) => OperationKind::CreateAttribute,
            Action::CreateIndex(_) => OperationKind::CreateIndex,
            Action::BackfillDocument { .. } => OperationKind::BackfillDocument,
        }
    }

    #[must_use]
    pub fn collection_id(&self) -> &str {
        match self {
            Action::CreateCollection(spec) => &spec.id,
            Action::CreateAttribute(spec) => &spec.collection_id,
            Action::CreateIndex(spec) => &spec.collection_id,
            Action::BackfillDocument { collection_id, .. } => collection_id,
        }
    }

    /// Attribute key, index key or document id. `None` for collections.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Action::CreateCollection(_) => None,
            Action::CreateAttribute(spec) => Some(&spec.key),
            Action::CreateIndex(spec) => Some(&spec.key),
            Action::BackfillDocument { document_id, .. } => Some(document_id),
        }
    }
}

/// Outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Not attempted (yet).
    Pending,
    Applied,
    /// The surface reported a duplicate. Counts as success.
    AlreadyExists,
    Failed(String),
}

impl OperationStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Applied | OperationStatus::AlreadyExists)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, OperationStatus::Failed(_))
    }

    /// Machine-readable status name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Applied => "applied",
            OperationStatus::AlreadyExists => "already_exists",
            OperationStatus::Failed(_) => "failed",
        }
    }

    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        match self {
            OperationStatus::Failed(cause) => Some(cause),
            _ => None,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Applied => write!(f, "applied"),
            OperationStatus::AlreadyExists => write!(f, "already exists"),
            OperationStatus::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

/// One step of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub action: Action,
    /// Whether a failure of this operation makes the whole run unsuccessful.
    pub critical: bool,
    pub status: OperationStatus,
}

impl Operation {
    #[must_use]
    pub fn new(action: Action, critical: bool) -> Self {
        Self {
            action,
            critical,
            status: OperationStatus::Pending,
        }
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.action.kind()
    }

    /// Short `collection[.key]` label for progress lines.
    #[must_use]
    pub fn target(&self) -> String {
        match self.action.key() {
            Some(key) => format!("{}.{key}", self.action.collection_id()),
            None => self.action.collection_id().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())?;
        if let Action::BackfillDocument { keys, .. } = &self.action {
            write!(f, " [{}]", keys.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct OperationRecord<'a> {
    kind: OperationKind,
    collection: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [String]>,
    critical: bool,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<&'a str>,
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = match &self.action {
            Action::BackfillDocument { keys, .. } => Some(keys.as_slice()),
            _ => None,
        };
        OperationRecord {
            kind: self.kind(),
            collection: self.action.collection_id(),
            key: self.action.key(),
            fields,
            critical: self.critical,
            status: self.status.as_str(),
            cause: self.status.cause(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_and_target() {
        let mut attribute = AttributeSpec::integer("views");
        attribute.collection_id = "posts".into();
        let op = Operation::new(Action::CreateAttribute(attribute), false);
        assert_eq!(op.to_string(), "create attribute posts.views");

        let op = Operation::new(
            Action::BackfillDocument {
                collection_id: "posts".into(),
                document_id: "d1".into(),
                keys: vec!["views".into(), "likes".into()],
            },
            false,
        );
        assert_eq!(op.to_string(), "backfill document posts.d1 [views, likes]");
    }

    #[test]
    fn test_serialized_shape() {
        let mut op = Operation::new(
            Action::CreateCollection(CollectionSpec::new("posts", "Posts")),
            true,
        );
        op.status = OperationStatus::Failed("rejected with status 400: bad".into());
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "create_collection",
                "collection": "posts",
                "critical": true,
                "status": "failed",
                "cause": "rejected with status 400: bad",
            })
        );

        op.status = OperationStatus::AlreadyExists;
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["status"], json!("already_exists"));
        assert!(value.get("cause").is_none());
    }

    #[test]
    fn test_status_classification() {
        assert!(OperationStatus::Applied.is_success());
        assert!(OperationStatus::AlreadyExists.is_success());
        assert!(!OperationStatus::Pending.is_success());
        assert!(OperationStatus::Failed("x".into()).is_failed());
        assert_eq!(OperationStatus::Failed("x".into()).cause(), Some("x"));
    }
}
