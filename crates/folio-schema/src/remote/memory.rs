//! In-memory administrative surface.
//!
//! Applies the same duplicate detection (409), unknown-attribute rejection
//! and partial-patch rules as the hosted store. Failures can be injected per
//! call and every call is recorded, so the executor and backfill runner can be
//! exercised without a network.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{
    AdminSurface, AttributePage, CollectionPage, Document, DocumentPage, IndexPage, PageRequest,
    RemoteAttribute, RemoteCollection, RemoteIndex,
};
use crate::catalog::{AttributeSpec, CollectionSpec, IndexSpec};
use crate::error::{RemoteError, RemoteResult};

/// A call received by the in-memory surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListCollections,
    ListAttributes { collection: String },
    ListIndexes { collection: String },
    CreateCollection { collection: String },
    CreateAttribute { collection: String, key: String },
    CreateIndex { collection: String, key: String },
    ListDocuments { collection: String, offset: u64 },
    UpdateDocument { collection: String, document: String },
}

type ErrorFactory = Box<dyn Fn() -> RemoteError + Send + Sync>;

struct Fault {
    call: Call,
    remaining: usize,
    error: ErrorFactory,
}

#[derive(Default)]
struct StoredCollection {
    name: String,
    attributes: Vec<RemoteAttribute>,
    indexes: Vec<RemoteIndex>,
    documents: Vec<Document>,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, StoredCollection>,
    faults: Vec<Fault>,
    calls: Vec<Call>,
}

/// Administrative surface held entirely in memory.
#[derive(Default)]
pub struct InMemorySurface {
    state: Mutex<State>,
}

impl std::fmt::Debug for InMemorySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemorySurface")
            .field("collections", &state.collections.keys().collect::<Vec<_>>())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

fn remote_attribute(spec: &AttributeSpec) -> RemoteAttribute {
    RemoteAttribute {
        key: spec.key.clone(),
        kind: spec.kind.name().to_string(),
        status: Some("available".to_string()),
        required: spec.required,
        array: spec.array,
    }
}

fn remote_index(spec: &IndexSpec) -> RemoteIndex {
    RemoteIndex {
        key: spec.key.clone(),
        kind: spec.kind.as_str().to_string(),
        attributes: spec.attributes.clone(),
        status: Some("available".to_string()),
    }
}

fn window<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .cloned()
        .collect()
}

fn not_found(what: &str) -> RemoteError {
    RemoteError::NotFound {
        message: format!("{what} could not be found"),
    }
}

impl InMemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a collection with no attributes.
    pub fn seed_collection(&self, id: &str, name: &str) {
        self.lock().collections.insert(
            id.to_string(),
            StoredCollection {
                name: name.to_string(),
                ..StoredCollection::default()
            },
        );
    }

    /// Create a collection with every attribute and index of `spec`.
    pub fn seed_from_spec(&self, spec: &CollectionSpec) {
        self.lock().collections.insert(
            spec.id.clone(),
            StoredCollection {
                name: spec.name.clone(),
                attributes: spec.attributes.iter().map(remote_attribute).collect(),
                indexes: spec.indexes.iter().map(remote_index).collect(),
                documents: Vec::new(),
            },
        );
    }

    /// Add an attribute to an existing collection.
    pub fn seed_attribute(&self, spec: &AttributeSpec) {
        if let Some(collection) = self.lock().collections.get_mut(&spec.collection_id) {
            collection.attributes.push(remote_attribute(spec));
        }
    }

    /// Store a document as-is, bypassing attribute checks.
    pub fn insert_document(&self, collection_id: &str, document_id: &str, data: Value) {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(collection) = self.lock().collections.get_mut(collection_id) {
            collection.documents.push(Document {
                id: document_id.to_string(),
                data,
            });
        }
    }

    /// Fail the next `times` matching calls with errors built by `error`.
    pub fn fail_with<F>(&self, call: Call, times: usize, error: F)
    where
        F: Fn() -> RemoteError + Send + Sync + 'static,
    {
        self.lock().faults.push(Fault {
            call,
            remaining: times,
            error: Box::new(error),
        });
    }

    /// Fields of a stored document.
    #[must_use]
    pub fn document(&self, collection_id: &str, document_id: &str) -> Option<Map<String, Value>> {
        self.lock()
            .collections
            .get(collection_id)?
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.data.clone())
    }

    #[must_use]
    pub fn has_collection(&self, collection_id: &str) -> bool {
        self.lock().collections.contains_key(collection_id)
    }

    #[must_use]
    pub fn has_attribute(&self, collection_id: &str, key: &str) -> bool {
        self.lock()
            .collections
            .get(collection_id)
            .is_some_and(|c| c.attributes.iter().any(|a| a.key == key))
    }

    #[must_use]
    pub fn has_index(&self, collection_id: &str, key: &str) -> bool {
        self.lock()
            .collections
            .get(collection_id)
            .is_some_and(|c| c.indexes.iter().any(|i| i.key == key))
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record a call and return the injected failure for it, if any.
    fn enter(state: &mut State, call: Call) -> RemoteResult<()> {
        state.calls.push(call.clone());
        if let Some(fault) = state
            .faults
            .iter_mut()
            .find(|f| f.call == call && f.remaining > 0)
        {
            fault.remaining -= 1;
            return Err((fault.error)());
        }
        Ok(())
    }
}

#[async_trait]
impl AdminSurface for InMemorySurface {
    async fn list_collections(&self, page: PageRequest) -> RemoteResult<CollectionPage> {
        let mut state = self.lock();
        Self::enter(&mut state, Call::ListCollections)?;
        let total = state.collections.len() as u64;
        let collections = state
            .collections
            .iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .map(|(id, c)| RemoteCollection {
                id: id.clone(),
                name: c.name.clone(),
                attributes: Vec::new(),
                indexes: Vec::new(),
            })
            .collect();
        Ok(CollectionPage { total, collections })
    }

    async fn list_attributes(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> RemoteResult<AttributePage> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::ListAttributes {
                collection: collection_id.to_string(),
            },
        )?;
        let collection = state
            .collections
            .get(collection_id)
            .ok_or_else(|| not_found("collection"))?;
        Ok(AttributePage {
            total: collection.attributes.len() as u64,
            attributes: window(&collection.attributes, page),
        })
    }

    async fn list_indexes(&self, collection_id: &str, page: PageRequest) -> RemoteResult<IndexPage> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::ListIndexes {
                collection: collection_id.to_string(),
            },
        )?;
        let collection = state
            .collections
            .get(collection_id)
            .ok_or_else(|| not_found("collection"))?;
        Ok(IndexPage {
            total: collection.indexes.len() as u64,
            indexes: window(&collection.indexes, page),
        })
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> RemoteResult<()> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::CreateCollection {
                collection: spec.id.clone(),
            },
        )?;
        if state.collections.contains_key(&spec.id) {
            return Err(RemoteError::AlreadyExists {
                message: format!("collection '{}' already exists", spec.id),
            });
        }
        state.collections.insert(
            spec.id.clone(),
            StoredCollection {
                name: spec.name.clone(),
                ..StoredCollection::default()
            },
        );
        Ok(())
    }

    async fn create_attribute(&self, spec: &AttributeSpec) -> RemoteResult<()> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::CreateAttribute {
                collection: spec.collection_id.clone(),
                key: spec.key.clone(),
            },
        )?;
        let collection = state
            .collections
            .get_mut(&spec.collection_id)
            .ok_or_else(|| not_found("collection"))?;
        if collection.attributes.iter().any(|a| a.key == spec.key) {
            return Err(RemoteError::AlreadyExists {
                message: format!("attribute '{}' already exists", spec.key),
            });
        }
        collection.attributes.push(remote_attribute(spec));
        Ok(())
    }

    async fn create_index(&self, spec: &IndexSpec) -> RemoteResult<()> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::CreateIndex {
                collection: spec.collection_id.clone(),
                key: spec.key.clone(),
            },
        )?;
        let collection = state
            .collections
            .get_mut(&spec.collection_id)
            .ok_or_else(|| not_found("collection"))?;
        if collection.indexes.iter().any(|i| i.key == spec.key) {
            return Err(RemoteError::AlreadyExists {
                message: format!("index '{}' already exists", spec.key),
            });
        }
        if let Some(missing) = spec
            .attributes
            .iter()
            .find(|key| !collection.attributes.iter().any(|a| &a.key == *key))
        {
            return Err(RemoteError::Rejected {
                status: 400,
                message: format!("attribute '{missing}' not found for index"),
            });
        }
        collection.indexes.push(remote_index(spec));
        Ok(())
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> RemoteResult<DocumentPage> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::ListDocuments {
                collection: collection_id.to_string(),
                offset: page.offset,
            },
        )?;
        let collection = state
            .collections
            .get(collection_id)
            .ok_or_else(|| not_found("collection"))?;
        Ok(DocumentPage {
            total: collection.documents.len() as u64,
            documents: collection
                .documents
                .iter()
                .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
                .take(page.limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: &Map<String, Value>,
    ) -> RemoteResult<()> {
        let mut state = self.lock();
        Self::enter(
            &mut state,
            Call::UpdateDocument {
                collection: collection_id.to_string(),
                document: document_id.to_string(),
            },
        )?;
        let collection = state
            .collections
            .get_mut(collection_id)
            .ok_or_else(|| not_found("collection"))?;
        if let Some(unknown) = patch
            .keys()
            .find(|key| !collection.attributes.iter().any(|a| &a.key == *key))
        {
            return Err(RemoteError::Rejected {
                status: 400,
                message: format!("unknown attribute: \"{unknown}\""),
            });
        }
        let document = collection
            .documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| not_found("document"))?;
        for (key, value) in patch {
            document.data.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
