//! Desired-state schema catalog.
//!
//! A [`Catalog`] is an ordered list of collections, each with its attributes
//! in creation order and its indexes. It is validated when built and never
//! changes afterwards.

mod builtin;
mod spec;
mod validate;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

pub use builtin::BUILTIN_COLLECTIONS;
pub use spec::{
    AttributeKind, AttributeSpec, CollectionSpec, DefaultValue, IndexKind, IndexOrder, IndexSpec,
};

/// Shape of a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    collections: Vec<CollectionSpec>,
}

/// Validated, immutable desired state.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    collections: Vec<CollectionSpec>,
}

impl Catalog {
    /// Build a catalog, stamping owning collection ids onto attributes and
    /// indexes, then validating it.
    pub fn new(mut collections: Vec<CollectionSpec>) -> SyncResult<Self> {
        for collection in &mut collections {
            for attribute in &mut collection.attributes {
                attribute.collection_id.clone_from(&collection.id);
            }
            for index in &mut collection.indexes {
                index.collection_id.clone_from(&collection.id);
            }
        }

        let problems = validate::validate(&collections);
        if !problems.is_empty() {
            return Err(SyncError::SchemaValidation { problems });
        }

        Ok(Self { collections })
    }

    /// The portfolio site's catalog, with collection ids taken from configuration.
    pub fn builtin(config: &SyncConfig) -> SyncResult<Self> {
        let id = |name: &str| {
            config.collection_id(name).map(str::to_string).ok_or_else(|| {
                SyncError::Config(crate::config::ConfigError::MissingVars(vec![
                    crate::config::collection_id_var(name),
                ]))
            })
        };
        Self::new(vec![
            builtin::posts(&id("posts")?),
            builtin::projects(&id("projects")?),
        ])
    }

    /// Parse a YAML catalog.
    pub fn from_yaml_str(content: &str) -> SyncResult<Self> {
        let file: CatalogFile = serde_yaml::from_str(content).map_err(|e| {
            let location = if let Some(loc) = e.location() {
                format!(" at line {}, column {}", loc.line(), loc.column())
            } else {
                String::new()
            };
            SyncError::CatalogLoad {
                message: format!("invalid YAML{location}: {e}"),
            }
        })?;
        Self::new(file.collections)
    }

    /// Read and parse a YAML catalog file.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::CatalogLoad {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&content)
    }

    #[must_use]
    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    #[must_use]
    pub fn collection(&self, id: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Default values declared for a collection, keyed by attribute key.
    #[must_use]
    pub fn defaults_for(&self, collection_id: &str) -> Map<String, Value> {
        self.collection(collection_id)
            .map(|collection| {
                collection
                    .attributes
                    .iter()
                    .filter_map(|a| a.default.as_ref().map(|d| (a.key.clone(), d.to_json())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serialize back to YAML in the catalog file shape.
    pub fn to_yaml(&self) -> SyncResult<String> {
        serde_yaml::to_string(&CatalogFile {
            collections: self.collections.clone(),
        })
        .map_err(|e| SyncError::CatalogLoad {
            message: e.to_string(),
        })
    }
}
