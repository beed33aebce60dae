//! Shared fixtures for reconciliation tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use folio_schema::prelude::*;

/// Configuration with every delay set to zero.
pub fn config(endpoint: &str) -> SyncConfig {
    SyncConfig::new(endpoint, "folio", "content", "test-key")
        .unwrap()
        .with_collection_id("posts", "posts")
        .with_collection_id("projects", "projects")
        .with_timing(Timing::immediate())
}

/// Small blog catalog: one required collection with a required attribute,
/// two defaulted ones and an index.
pub fn posts_catalog() -> Catalog {
    Catalog::new(vec![CollectionSpec::new("posts", "Posts")
        .with_permissions(&["read(\"any\")"])
        .attribute(AttributeSpec::string("title", 255).required())
        .attribute(
            AttributeSpec::integer("views")
                .bounds(Some(0), None)
                .default_value(DefaultValue::Int(0)),
        )
        .attribute(AttributeSpec::boolean("published").default_value(DefaultValue::Bool(false)))
        .index(IndexSpec::new("idx_title", IndexKind::Unique, &["title"]))])
    .unwrap()
}

pub fn reconciler(catalog: Catalog, surface: &Arc<InMemorySurface>) -> Reconciler {
    Reconciler::new(catalog, surface.clone(), &config("http://localhost:1"))
}

/// Progress sink that remembers every line it was given.
#[derive(Default)]
pub struct RecordingProgress {
    lines: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn operation_finished(&self, operation: &Operation) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{operation}: {}", operation.status));
        }
    }
}
