//! Read-only snapshot of the remote schema.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{RemoteResult, SyncError, SyncResult};
use crate::pacing::Pacer;
use crate::remote::{AdminSurface, PageRequest, RemoteCollection};

/// What exists remotely, keyed by collection id. Taken once per run and never
/// refreshed after mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSnapshot {
    collections: BTreeMap<String, RemoteCollection>,
}

impl RemoteSnapshot {
    #[must_use]
    pub fn new(collections: Vec<RemoteCollection>) -> Self {
        Self {
            collections: collections.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    #[must_use]
    pub fn collection(&self, id: &str) -> Option<&RemoteCollection> {
        self.collections.get(id)
    }

    #[must_use]
    pub fn has_collection(&self, id: &str) -> bool {
        self.collections.contains_key(id)
    }

    #[must_use]
    pub fn has_attribute(&self, collection_id: &str, key: &str) -> bool {
        self.collection(collection_id)
            .is_some_and(|c| c.attributes.iter().any(|a| a.key == key))
    }

    #[must_use]
    pub fn has_index(&self, collection_id: &str, key: &str) -> bool {
        self.collection(collection_id)
            .is_some_and(|c| c.indexes.iter().any(|i| i.key == key))
    }

    pub fn collections(&self) -> impl Iterator<Item = &RemoteCollection> {
        self.collections.values()
    }
}

/// Queries the administrative surface for existing schema.
///
/// Every failure here is fatal and surfaces as [`SyncError::Connectivity`].
pub struct RemoteStateProbe<'a> {
    surface: &'a dyn AdminSurface,
    pacer: &'a Pacer,
    page_size: u32,
}

impl<'a> RemoteStateProbe<'a> {
    #[must_use]
    pub fn new(surface: &'a dyn AdminSurface, pacer: &'a Pacer, page_size: u32) -> Self {
        Self {
            surface,
            pacer,
            page_size: page_size.max(1),
        }
    }

    /// Every collection of the database, without attributes or indexes.
    pub async fn list_collections(&self) -> SyncResult<Vec<RemoteCollection>> {
        let collections = self
            .paged("collections", "listing collections", |page| async move {
                self.surface
                    .list_collections(page)
                    .await
                    .map(|listed| (listed.total, listed.collections))
            })
            .await?;
        debug!(count = collections.len(), "listed remote collections");
        Ok(collections)
    }

    /// Snapshot of the remote schema. Attributes and indexes are fetched only
    /// for collections the catalog declares.
    pub async fn list_existing(&self, catalog: &Catalog) -> SyncResult<RemoteSnapshot> {
        let mut collections = self.list_collections().await?;
        for collection in &mut collections {
            if catalog.collection(&collection.id).is_none() {
                continue;
            }
            let id = collection.id.as_str();
            let attributes = self
                .paged(id, &format!("listing attributes of {id}"), |page| async move {
                    self.surface
                        .list_attributes(id, page)
                        .await
                        .map(|listed| (listed.total, listed.attributes))
                })
                .await?;
            let indexes = self
                .paged(id, &format!("listing indexes of {id}"), |page| async move {
                    self.surface
                        .list_indexes(id, page)
                        .await
                        .map(|listed| (listed.total, listed.indexes))
                })
                .await?;
            collection.attributes = attributes;
            collection.indexes = indexes;
        }
        info!(collections = collections.len(), "probed remote schema");
        Ok(RemoteSnapshot::new(collections))
    }

    /// Follows `limit`/`offset` until an empty page or the reported total.
    async fn paged<T, F, Fut>(&self, target: &str, context: &str, fetch: F) -> SyncResult<Vec<T>>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = RemoteResult<(u64, Vec<T>)>>,
    {
        let mut items = Vec::new();
        let mut offset = 0u64;
        loop {
            let page = PageRequest {
                limit: self.page_size,
                offset,
            };
            let (total, received) = self
                .pacer
                .call(target, || fetch(page))
                .await
                .map_err(|e| SyncError::connectivity(context, e))?;

            let count = received.len() as u64;
            items.extend(received);
            offset += count;
            if count == 0 || offset >= total {
                break;
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeSpec, CollectionSpec, IndexKind, IndexSpec};
    use crate::config::Timing;
    use crate::error::RemoteError;
    use crate::remote::{Call, InMemorySurface};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CollectionSpec::new("posts", "Posts").attribute(AttributeSpec::integer("views"))
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_pages_through_collections() {
        let surface = InMemorySurface::new();
        for i in 0..5 {
            surface.seed_collection(&format!("c{i}"), "C");
        }
        let pacer = Pacer::new(&Timing::immediate());
        let probe = RemoteStateProbe::new(&surface, &pacer, 2);
        let collections = probe.list_collections().await.unwrap();
        assert_eq!(collections.len(), 5);
        let listings = surface
            .calls()
            .into_iter()
            .filter(|c| *c == Call::ListCollections)
            .count();
        assert_eq!(listings, 3);
    }

    #[tokio::test]
    async fn test_only_declared_collections_are_inspected() {
        let surface = InMemorySurface::new();
        surface.seed_from_spec(&catalog().collections()[0]);
        surface.seed_collection("unrelated", "Unrelated");
        let pacer = Pacer::new(&Timing::immediate());
        let snapshot = RemoteStateProbe::new(&surface, &pacer, 100)
            .list_existing(&catalog())
            .await
            .unwrap();

        assert!(snapshot.has_attribute("posts", "views"));
        assert!(snapshot.has_collection("unrelated"));
        assert!(!surface.calls().contains(&Call::ListAttributes {
            collection: "unrelated".into()
        }));
    }

    #[tokio::test]
    async fn test_pages_through_attributes_and_indexes() {
        let mut posts = CollectionSpec::new("posts", "Posts");
        for key in ["a", "b", "c", "d", "e"] {
            posts = posts.attribute(AttributeSpec::integer(key));
        }
        for key in ["a", "b", "c"] {
            posts = posts.index(IndexSpec::new(&format!("idx_{key}"), IndexKind::Key, &[key]));
        }
        let catalog = Catalog::new(vec![posts]).unwrap();
        let surface = InMemorySurface::new();
        surface.seed_from_spec(&catalog.collections()[0]);

        let pacer = Pacer::new(&Timing::immediate());
        let snapshot = RemoteStateProbe::new(&surface, &pacer, 2)
            .list_existing(&catalog)
            .await
            .unwrap();

        assert!(snapshot.has_attribute("posts", "e"));
        assert!(snapshot.has_index("posts", "idx_c"));
        let calls = surface.calls();
        let listed = |call: &Call| calls.iter().filter(|c| c == &call).count();
        assert_eq!(
            listed(&Call::ListAttributes {
                collection: "posts".into()
            }),
            3
        );
        assert_eq!(
            listed(&Call::ListIndexes {
                collection: "posts".into()
            }),
            2
        );
    }

    #[tokio::test]
    async fn test_failure_is_connectivity_error() {
        let surface = InMemorySurface::new();
        surface.fail_with(Call::ListCollections, 1, || RemoteError::Unauthorized {
            message: "invalid key".into(),
        });
        let pacer = Pacer::new(&Timing::immediate());
        let err = RemoteStateProbe::new(&surface, &pacer, 100)
            .list_existing(&catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Connectivity { .. }));
        assert!(err.to_string().contains("invalid key"));
    }
}
