//! Administrative surface of the hosted document database.
//!
//! [`AdminSurface`] is the seam between the engine and the remote store.
//! [`HttpAdminClient`] talks to the real HTTPS API. With the `test-util`
//! feature, `InMemorySurface` mirrors its duplicate detection and validation
//! rules in memory.

mod http;
#[cfg(any(test, feature = "test-util"))]
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{AttributeSpec, CollectionSpec, IndexSpec};
use crate::error::RemoteResult;

pub use http::HttpAdminClient;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{Call, InMemorySurface};

/// Observed collection. Attributes and indexes are filled by the probe only
/// for collections the catalog declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCollection {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<RemoteAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<RemoteIndex>,
}

/// Observed attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttribute {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `available`, `processing`, `failed`...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub array: bool,
}

/// Observed index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndex {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A stored document: its id plus every field the surface returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// One page of a document listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPage {
    /// Total number of documents in the collection.
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

/// Operations offered by the administrative surface.
///
/// Every method is a single remote call; pacing and retries are the caller's
/// business.
#[async_trait]
pub trait AdminSurface: Send + Sync {
    /// List every collection of the configured database.
    async fn list_collections(&self, page: PageRequest) -> RemoteResult<CollectionPage>;

    async fn list_attributes(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> RemoteResult<AttributePage>;

    async fn list_indexes(&self, collection_id: &str, page: PageRequest) -> RemoteResult<IndexPage>;

    async fn create_collection(&self, spec: &CollectionSpec) -> RemoteResult<()>;

    /// Create one attribute; the kind picks the typed endpoint.
    async fn create_attribute(&self, spec: &AttributeSpec) -> RemoteResult<()>;

    async fn create_index(&self, spec: &IndexSpec) -> RemoteResult<()>;

    async fn list_documents(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> RemoteResult<DocumentPage>;

    /// Partial update: fields absent from `patch` are left untouched.
    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: &Map<String, Value>,
    ) -> RemoteResult<()>;
}

/// One page of a collection listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub collections: Vec<RemoteCollection>,
}

/// One page of a collection's attributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributePage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub attributes: Vec<RemoteAttribute>,
}

/// One page of a collection's indexes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub indexes: Vec<RemoteIndex>,
}
