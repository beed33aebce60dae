//! Declarative schema types.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Desired state of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    /// Collection id on the remote surface.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Permission strings, e.g. `read("any")`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Whether per-document permissions are honored.
    #[serde(default)]
    pub document_security: bool,
    /// Whether failing to create this collection fails the run.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Attributes in creation order.
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions: Vec::new(),
            document_security: false,
            required: true,
            attributes: Vec::new(),
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| (*p).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_document_security(mut self, enabled: bool) -> Self {
        self.document_security = enabled;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Append an attribute, taking ownership of its collection id.
    #[must_use]
    pub fn attribute(mut self, mut attribute: AttributeSpec) -> Self {
        attribute.collection_id.clone_from(&self.id);
        self.attributes.push(attribute);
        self
    }

    /// Append an index, taking ownership of its collection id.
    #[must_use]
    pub fn index(mut self, mut index: IndexSpec) -> Self {
        index.collection_id.clone_from(&self.id);
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

/// Value type of an attribute together with its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeKind {
    String {
        /// Maximum length in characters.
        size: u32,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Boolean,
}

impl AttributeKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::String { .. } => "string",
            AttributeKind::Integer { .. } => "integer",
            AttributeKind::Boolean => "boolean",
        }
    }
}

/// Default value of an attribute. Must match the declared [`AttributeKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl DefaultValue {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            DefaultValue::Bool(_) => "boolean",
            DefaultValue::Int(_) => "integer",
            DefaultValue::String(_) => "string",
        }
    }

    /// JSON form sent in create calls and document patches.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DefaultValue::Bool(v) => serde_json::Value::Bool(*v),
            DefaultValue::Int(v) => serde_json::Value::from(*v),
            DefaultValue::String(v) => serde_json::Value::String(v.clone()),
        }
    }
}

/// Desired state of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Owning collection. Filled from the enclosing collection when loading.
    #[serde(default, skip_serializing)]
    pub collection_id: String,
    pub key: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl AttributeSpec {
    fn with_kind(key: &str, kind: AttributeKind) -> Self {
        Self {
            collection_id: String::new(),
            key: key.to_string(),
            kind,
            array: false,
            required: false,
            default: None,
        }
    }

    #[must_use]
    pub fn string(key: &str, size: u32) -> Self {
        Self::with_kind(key, AttributeKind::String { size })
    }

    #[must_use]
    pub fn integer(key: &str) -> Self {
        Self::with_kind(key, AttributeKind::Integer { min: None, max: None })
    }

    #[must_use]
    pub fn boolean(key: &str) -> Self {
        Self::with_kind(key, AttributeKind::Boolean)
    }

    /// Set integer bounds. Ignored for non-integer kinds.
    #[must_use]
    pub fn bounds(mut self, lower: Option<i64>, upper: Option<i64>) -> Self {
        if let AttributeKind::Integer { min, max } = &mut self.kind {
            *min = lower;
            *max = upper;
        }
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// Index type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Ordered lookup key.
    Key,
    /// Uniqueness constraint.
    Unique,
}

impl IndexKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Key => "key",
            IndexKind::Unique => "unique",
        }
    }
}

/// Sort direction of one covered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexOrder {
    #[default]
    Asc,
    Desc,
}

/// Desired state of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    #[serde(default, skip_serializing)]
    pub collection_id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub kind: IndexKind,
    /// Covered attribute keys, in index order.
    pub attributes: Vec<String>,
    /// Per-attribute order. Empty means ascending throughout.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<IndexOrder>,
}

impl IndexSpec {
    #[must_use]
    pub fn new(key: &str, kind: IndexKind, attributes: &[&str]) -> Self {
        Self {
            collection_id: String::new(),
            key: key.to_string(),
            kind,
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
            orders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_orders(mut self, orders: &[IndexOrder]) -> Self {
        self.orders = orders.to_vec();
        self
    }

    /// Orders as sent to the surface, one per covered attribute.
    #[must_use]
    pub fn effective_orders(&self) -> Vec<IndexOrder> {
        if self.orders.is_empty() {
            vec![IndexOrder::Asc; self.attributes.len()]
        } else {
            self.orders.clone()
        }
    }
}
