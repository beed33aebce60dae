//! Load-time consistency checks.
//!
//! Every problem is collected so a broken catalog is reported in one pass.

use std::collections::HashSet;

use super::spec::{AttributeKind, AttributeSpec, CollectionSpec, DefaultValue};

/// Check a collection list and return one message per problem found.
pub(crate) fn validate(collections: &[CollectionSpec]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen_collections = HashSet::new();

    for collection in collections {
        if collection.id.trim().is_empty() {
            problems.push(format!("collection '{}' has an empty id", collection.name));
        } else if !seen_collections.insert(collection.id.as_str()) {
            problems.push(format!("duplicate collection id '{}'", collection.id));
        }
        if collection.name.trim().is_empty() {
            problems.push(format!("collection '{}' has an empty name", collection.id));
        }

        let mut seen_keys = HashSet::new();
        for attribute in &collection.attributes {
            if attribute.key.trim().is_empty() {
                problems.push(format!(
                    "collection '{}' has an attribute with an empty key",
                    collection.id
                ));
            } else if !seen_keys.insert(attribute.key.as_str()) {
                problems.push(format!(
                    "duplicate attribute key '{}' in collection '{}'",
                    attribute.key, collection.id
                ));
            }
            validate_attribute(&collection.id, attribute, &mut problems);
        }

        let mut seen_indexes = HashSet::new();
        for index in &collection.indexes {
            if !seen_indexes.insert(index.key.as_str()) {
                problems.push(format!(
                    "duplicate index key '{}' in collection '{}'",
                    index.key, collection.id
                ));
            }
            if index.attributes.is_empty() {
                problems.push(format!(
                    "index '{}' in collection '{}' covers no attributes",
                    index.key, collection.id
                ));
            }
            for covered in &index.attributes {
                if !seen_keys.contains(covered.as_str()) {
                    problems.push(format!(
                        "index '{}' in collection '{}' references unknown attribute '{}'",
                        index.key, collection.id, covered
                    ));
                }
            }
            if !index.orders.is_empty() && index.orders.len() != index.attributes.len() {
                problems.push(format!(
                    "index '{}' in collection '{}' has {} orders for {} attributes",
                    index.key,
                    collection.id,
                    index.orders.len(),
                    index.attributes.len()
                ));
            }
        }
    }

    problems
}

fn validate_attribute(collection_id: &str, attribute: &AttributeSpec, problems: &mut Vec<String>) {
    let at = format!("attribute '{}' in collection '{}'", attribute.key, collection_id);

    match attribute.kind {
        AttributeKind::String { size } if size == 0 => {
            problems.push(format!("{at} must have a size of at least 1"));
        }
        AttributeKind::Integer {
            min: Some(min),
            max: Some(max),
        } if min > max => {
            problems.push(format!("{at} has min {min} greater than max {max}"));
        }
        _ => {}
    }

    let Some(default) = &attribute.default else {
        return;
    };

    if attribute.required {
        problems.push(format!("{at} is required and cannot carry a default"));
    }
    if attribute.array {
        problems.push(format!("{at} is an array and cannot carry a default"));
    }

    match (&attribute.kind, default) {
        (AttributeKind::String { size }, DefaultValue::String(value)) => {
            let len = value.chars().count();
            if len > *size as usize {
                problems.push(format!("{at} default is {len} characters, above size {size}"));
            }
        }
        (AttributeKind::Integer { min, max }, DefaultValue::Int(value)) => {
            if min.is_some_and(|min| *value < min) || max.is_some_and(|max| *value > max) {
                problems.push(format!("{at} default {value} is outside its bounds"));
            }
        }
        (AttributeKind::Boolean, DefaultValue::Bool(_)) => {}
        (kind, default) => problems.push(format!(
            "{at} is declared {} but its default is {}",
            kind.name(),
            default.kind_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::spec::{IndexKind, IndexOrder, IndexSpec};

    fn posts() -> CollectionSpec {
        CollectionSpec::new("posts", "Posts")
            .attribute(AttributeSpec::string("title", 255).required())
            .attribute(
                AttributeSpec::integer("views")
                    .bounds(Some(0), None)
                    .default_value(DefaultValue::Int(0)),
            )
            .index(IndexSpec::new("idx_title", IndexKind::Key, &["title"]))
    }

    #[test]
    fn test_valid_catalog_has_no_problems() {
        assert!(validate(&[posts()]).is_empty());
    }

    #[test]
    fn test_index_on_unknown_attribute() {
        let collection = posts().index(IndexSpec::new("idx_slug", IndexKind::Unique, &["slug"]));
        let problems = validate(&[collection]);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("unknown attribute 'slug'"));
    }

    #[test]
    fn test_duplicate_attribute_key() {
        let collection = posts().attribute(AttributeSpec::string("title", 10));
        let problems = validate(&[collection]);
        assert!(problems.iter().any(|p| p.contains("duplicate attribute key 'title'")));
    }

    #[test]
    fn test_duplicate_collection_id() {
        let problems = validate(&[posts(), posts()]);
        assert!(problems.iter().any(|p| p.contains("duplicate collection id")));
    }

    #[test]
    fn test_default_kind_mismatch() {
        let collection = CollectionSpec::new("posts", "Posts").attribute(
            AttributeSpec::boolean("published").default_value(DefaultValue::String("no".into())),
        );
        let problems = validate(&[collection]);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("declared boolean but its default is string"));
    }

    #[test]
    fn test_default_outside_bounds() {
        let collection = CollectionSpec::new("posts", "Posts").attribute(
            AttributeSpec::integer("likes")
                .bounds(Some(0), Some(10))
                .default_value(DefaultValue::Int(-1)),
        );
        let problems = validate(&[collection]);
        assert!(problems[0].contains("outside its bounds"));
    }

    #[test]
    fn test_string_default_longer_than_size() {
        let collection = CollectionSpec::new("posts", "Posts").attribute(
            AttributeSpec::string("status", 4).default_value(DefaultValue::String("draft".into())),
        );
        let problems = validate(&[collection]);
        assert!(problems[0].contains("above size 4"));
    }

    #[test]
    fn test_required_or_array_with_default() {
        let collection = CollectionSpec::new("posts", "Posts")
            .attribute(
                AttributeSpec::boolean("published")
                    .required()
                    .default_value(DefaultValue::Bool(false)),
            )
            .attribute(
                AttributeSpec::string("tags", 32)
                    .array()
                    .default_value(DefaultValue::String(String::new())),
            );
        let problems = validate(&[collection]);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_bad_constraints() {
        let collection = CollectionSpec::new("posts", "Posts")
            .attribute(AttributeSpec::string("empty", 0))
            .attribute(AttributeSpec::integer("range").bounds(Some(5), Some(1)));
        let problems = validate(&[collection]);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_order_count_mismatch() {
        let collection = posts().index(
            IndexSpec::new("idx_mix", IndexKind::Key, &["title", "views"])
                .with_orders(&[IndexOrder::Desc]),
        );
        let problems = validate(&[collection]);
        assert!(problems[0].contains("1 orders for 2 attributes"));
    }

    #[test]
    fn test_all_problems_collected() {
        let broken = CollectionSpec::new("", "")
            .index(IndexSpec::new("idx_none", IndexKind::Key, &[]));
        let problems = validate(&[broken]);
        assert_eq!(problems.len(), 3);
    }
}
