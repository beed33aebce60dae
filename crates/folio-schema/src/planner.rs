//! Diff between the catalog and the remote snapshot.

use crate::catalog::{Catalog, CollectionSpec};
use crate::operation::{Action, Operation};
use crate::probe::RemoteSnapshot;

/// Operations that bring the remote schema to the catalog, all `Pending`.
///
/// Per collection, in catalog order: the collection itself, then its
/// attributes in declaration order, then its indexes. Anything the snapshot
/// already shows is left out.
#[must_use]
pub fn plan(catalog: &Catalog, snapshot: &RemoteSnapshot) -> Vec<Operation> {
    let mut operations = Vec::new();

    for collection in catalog.collections() {
        let exists = snapshot.has_collection(&collection.id);
        if !exists {
            let bare = CollectionSpec {
                attributes: Vec::new(),
                indexes: Vec::new(),
                ..collection.clone()
            };
            operations.push(Operation::new(
                Action::CreateCollection(bare),
                collection.required,
            ));
        }

        for attribute in &collection.attributes {
            if exists && snapshot.has_attribute(&collection.id, &attribute.key) {
                continue;
            }
            operations.push(Operation::new(
                Action::CreateAttribute(attribute.clone()),
                attribute.required,
            ));
        }

        for index in &collection.indexes {
            if exists && snapshot.has_index(&collection.id, &index.key) {
                continue;
            }
            operations.push(Operation::new(Action::CreateIndex(index.clone()), false));
        }
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeSpec, IndexKind, IndexSpec};
    use crate::operation::OperationKind;
    use crate::remote::{RemoteAttribute, RemoteCollection, RemoteIndex};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CollectionSpec::new("posts", "Posts")
                .attribute(AttributeSpec::string("title", 255).required())
                .attribute(AttributeSpec::integer("views"))
                .index(IndexSpec::new("idx_title", IndexKind::Unique, &["title"])),
            CollectionSpec::new("projects", "Projects")
                .optional()
                .attribute(AttributeSpec::string("title", 255).required()),
        ])
        .unwrap()
    }

    fn remote(id: &str, attributes: &[&str], indexes: &[&str]) -> RemoteCollection {
        RemoteCollection {
            id: id.into(),
            name: id.into(),
            attributes: attributes
                .iter()
                .map(|key| RemoteAttribute {
                    key: (*key).into(),
                    kind: "string".into(),
                    status: None,
                    required: false,
                    array: false,
                })
                .collect(),
            indexes: indexes
                .iter()
                .map(|key| RemoteIndex {
                    key: (*key).into(),
                    kind: "key".into(),
                    attributes: Vec::new(),
                    status: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_remote_gets_everything_in_dependency_order() {
        let ops = plan(&catalog(), &RemoteSnapshot::default());
        let labels: Vec<_> = ops.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "create collection posts",
                "create attribute posts.title",
                "create attribute posts.views",
                "create index posts.idx_title",
                "create collection projects",
                "create attribute projects.title",
            ]
        );
    }

    #[test]
    fn test_existing_objects_are_skipped() {
        let snapshot = RemoteSnapshot::new(vec![remote("posts", &["title"], &["idx_title"])]);
        let ops = plan(&catalog(), &snapshot);
        let posts: Vec<_> = ops
            .iter()
            .filter(|op| op.action.collection_id() == "posts")
            .map(ToString::to_string)
            .collect();
        assert_eq!(posts, vec!["create attribute posts.views"]);
    }

    #[test]
    fn test_fully_present_catalog_plans_nothing() {
        let snapshot = RemoteSnapshot::new(vec![
            remote("posts", &["title", "views"], &["idx_title"]),
            remote("projects", &["title"], &[]),
        ]);
        assert!(plan(&catalog(), &snapshot).is_empty());
    }

    #[test]
    fn test_criticality() {
        let ops = plan(&catalog(), &RemoteSnapshot::default());
        let critical: Vec<_> = ops
            .iter()
            .filter(|op| op.critical)
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            critical,
            vec![
                "create collection posts",
                "create attribute posts.title",
                "create attribute projects.title",
            ]
        );
        assert!(ops
            .iter()
            .filter(|op| op.kind() == OperationKind::CreateIndex)
            .all(|op| !op.critical));
    }

    #[test]
    fn test_collection_operation_carries_no_children() {
        let ops = plan(&catalog(), &RemoteSnapshot::default());
        match &ops[0].action {
            Action::CreateCollection(spec) => {
                assert!(spec.attributes.is_empty());
                assert!(spec.indexes.is_empty());
            }
            other => panic!("unexpected first operation: {other:?}"),
        }
    }
}
