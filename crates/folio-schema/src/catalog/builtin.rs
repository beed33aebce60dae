//! Schema of the portfolio site: blog posts and showcased projects.

use super::spec::{AttributeSpec, CollectionSpec, DefaultValue, IndexKind, IndexOrder, IndexSpec};

/// Logical names of the built-in collections. Each needs a configured id.
pub const BUILTIN_COLLECTIONS: [&str; 2] = ["posts", "projects"];

const PUBLIC_READ: &[&str] = &["read(\"any\")"];

pub(crate) fn posts(id: &str) -> CollectionSpec {
    CollectionSpec::new(id, "Posts")
        .with_permissions(PUBLIC_READ)
        .attribute(AttributeSpec::string("title", 255).required())
        .attribute(AttributeSpec::string("slug", 255).required())
        .attribute(AttributeSpec::string("content", 1_000_000).required())
        .attribute(AttributeSpec::string("excerpt", 500))
        .attribute(AttributeSpec::string("coverImage", 2048))
        .attribute(AttributeSpec::string("tags", 64).array())
        .attribute(AttributeSpec::boolean("published").default_value(DefaultValue::Bool(false)))
        .attribute(AttributeSpec::boolean("featured").default_value(DefaultValue::Bool(false)))
        .attribute(
            AttributeSpec::integer("views")
                .bounds(Some(0), None)
                .default_value(DefaultValue::Int(0)),
        )
        .attribute(
            AttributeSpec::integer("likes")
                .bounds(Some(0), None)
                .default_value(DefaultValue::Int(0)),
        )
        .attribute(AttributeSpec::integer("readingTime").bounds(Some(0), Some(600)))
        .index(IndexSpec::new("idx_slug", IndexKind::Unique, &["slug"]))
        .index(IndexSpec::new("idx_published", IndexKind::Key, &["published"]))
        .index(
            IndexSpec::new("idx_popular", IndexKind::Key, &["published", "views"])
                .with_orders(&[IndexOrder::Asc, IndexOrder::Desc]),
        )
}

pub(crate) fn projects(id: &str) -> CollectionSpec {
    CollectionSpec::new(id, "Projects")
        .with_permissions(PUBLIC_READ)
        .attribute(AttributeSpec::string("title", 255).required())
        .attribute(AttributeSpec::string("description", 5000).required())
        .attribute(AttributeSpec::string("techStack", 64).array())
        .attribute(AttributeSpec::string("githubUrl", 2048))
        .attribute(AttributeSpec::string("liveUrl", 2048))
        .attribute(AttributeSpec::string("imageUrl", 2048))
        .attribute(AttributeSpec::boolean("featured").default_value(DefaultValue::Bool(false)))
        .attribute(
            AttributeSpec::integer("order")
                .bounds(Some(0), None)
                .default_value(DefaultValue::Int(0)),
        )
        .index(IndexSpec::new("idx_featured", IndexKind::Key, &["featured"]))
        .index(IndexSpec::new("idx_order", IndexKind::Key, &["order"]))
}
