//! Schema registry
//!
//! An explicit, immutable description of every node type in the graph. Built
//! once at startup and handed to the constraint planner by reference.

use crate::error::{registry_error, AdapterResult};
use crate::typemap::SemanticType;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Separates label, property and kind in directive keys
pub const KEY_SEPARATOR: &str = "::";

/// Constraint or index category attached to a field
///
/// Declaration order is the planner's priority order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    UniqueIndexed,
    UniqueRequired,
    Indexed,
    Unique,
    Required,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 6] = [
        ConstraintKind::PrimaryKey,
        ConstraintKind::UniqueIndexed,
        ConstraintKind::UniqueRequired,
        ConstraintKind::Indexed,
        ConstraintKind::Unique,
        ConstraintKind::Required,
    ];

    /// Metadata flags that make up this kind
    pub fn flags(&self) -> ConstraintFlags {
        let (unique, indexed, existence) = match self {
            ConstraintKind::PrimaryKey => (true, true, true),
            ConstraintKind::UniqueIndexed => (true, true, false),
            ConstraintKind::UniqueRequired => (true, false, true),
            ConstraintKind::Indexed => (false, true, false),
            ConstraintKind::Unique => (true, false, false),
            ConstraintKind::Required => (false, false, true),
        };
        ConstraintFlags {
            unique,
            indexed,
            existence,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY_KEY",
            ConstraintKind::UniqueIndexed => "UNIQUE_INDEXED",
            ConstraintKind::UniqueRequired => "UNIQUE_REQUIRED",
            ConstraintKind::Indexed => "INDEXED",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::Required => "REQUIRED",
        }
    }
}

/// Raw `unique` / `indexed` / `existence` metadata declared on a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintFlags {
    pub unique: bool,
    pub indexed: bool,
    pub existence: bool,
}

impl ConstraintFlags {
    pub fn contains(&self, other: ConstraintFlags) -> bool {
        (self.unique || !other.unique)
            && (self.indexed || !other.indexed)
            && (self.existence || !other.existence)
    }

    /// Every kind whose flags are all present
    pub fn kinds(&self) -> BTreeSet<ConstraintKind> {
        ConstraintKind::ALL
            .into_iter()
            .filter(|kind| self.contains(kind.flags()))
            .collect()
    }
}

/// A single property of a node type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub label: String,
    pub property: String,
    pub semantic_type: SemanticType,
    pub constraint_kinds: BTreeSet<ConstraintKind>,
}

/// A node type: its label and fields in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub label: String,
    pub fields: Vec<FieldDescriptor>,
}

impl NodeDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fields: Vec::new(),
        }
    }

    /// Node carrying the base fields every stored node has:
    /// `id` (primary key), `created_on` and `updated_on` (required)
    pub fn with_base_fields(label: impl Into<String>) -> Self {
        Self::new(label)
            .field_with(
                "id",
                SemanticType::optional(SemanticType::Uuid),
                [ConstraintKind::PrimaryKey],
            )
            .field_with(
                "created_on",
                SemanticType::optional(SemanticType::DateTime),
                [ConstraintKind::Required],
            )
            .field_with(
                "updated_on",
                SemanticType::optional(SemanticType::DateTime),
                [ConstraintKind::Required],
            )
    }

    /// Add a field without constraint metadata
    pub fn field(self, property: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.field_with(property, semantic_type, std::iter::empty::<ConstraintKind>())
    }

    /// Add a field with an explicit set of constraint kinds
    pub fn field_with<I>(mut self, property: impl Into<String>, semantic_type: SemanticType, kinds: I) -> Self
    where
        I: IntoIterator<Item = ConstraintKind>,
    {
        self.fields.push(FieldDescriptor {
            label: self.label.clone(),
            property: property.into(),
            semantic_type,
            constraint_kinds: kinds.into_iter().collect(),
        });
        self
    }

    /// Add a field described by raw metadata flags
    pub fn field_flagged(self, property: impl Into<String>, semantic_type: SemanticType, flags: ConstraintFlags) -> Self {
        let kinds = flags.kinds();
        self.field_with(property, semantic_type, kinds)
    }
}

/// Ordered, immutable collection of node descriptors
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    nodes: Vec<NodeDescriptor>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// The news-clustering graph model
    pub fn news_graph() -> Self {
        let url = || SemanticType::optional(SemanticType::Url);
        let nodes = vec![
            NodeDescriptor::with_base_fields("Article")
                .field("title", SemanticType::String)
                .field("content", SemanticType::String)
                .field("published_date", SemanticType::DateTime)
                .field("url", url())
                .field("authors", SemanticType::optional(SemanticType::list_of(SemanticType::String)))
                .field("tags", SemanticType::optional(SemanticType::list_of(SemanticType::String)))
                .field("metadata", SemanticType::optional(SemanticType::Map))
                .field(
                    "images",
                    SemanticType::Union(vec![
                        SemanticType::Url,
                        SemanticType::Named("FileUrl".to_string()),
                        SemanticType::Null,
                    ]),
                ),
            NodeDescriptor::with_base_fields("ArticleGroup")
                .field("total_entity_scorable", SemanticType::Float)
                .field("total_keyword_scorable", SemanticType::Float),
            NodeDescriptor::with_base_fields("Entity").field("word", SemanticType::String),
            NodeDescriptor::with_base_fields("EntityGroup").field("entity_type", SemanticType::String),
            NodeDescriptor::with_base_fields("KeywordGroup").field("word", SemanticType::String),
            NodeDescriptor::with_base_fields("Source")
                .field("name", SemanticType::String)
                .field("description", SemanticType::optional(SemanticType::String))
                .field("url", url())
                .field("metadata", SemanticType::optional(SemanticType::Map)),
        ];
        Self { nodes }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter()
    }

    /// Every field of every node, in registry order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.nodes.iter().flat_map(|node| node.fields.iter())
    }

    pub fn node(&self, label: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|node| node.label == label)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    nodes: Vec<NodeDescriptor>,
}

impl SchemaRegistryBuilder {
    pub fn node(mut self, node: NodeDescriptor) -> Self {
        self.nodes.push(node);
        self
    }

    /// Reject blank or duplicate labels and properties
    pub fn build(self) -> AdapterResult<SchemaRegistry> {
        let mut labels = HashSet::new();
        for node in &self.nodes {
            if node.label.trim().is_empty() {
                return Err(registry_error("node label cannot be empty"));
            }
            if node.label.contains(KEY_SEPARATOR) {
                return Err(registry_error(format!(
                    "node label '{}' cannot contain '{}'",
                    node.label, KEY_SEPARATOR
                )));
            }
            if !labels.insert(node.label.as_str()) {
                return Err(registry_error(format!("duplicate node label '{}'", node.label)));
            }

            let mut properties = HashSet::new();
            for field in &node.fields {
                if field.property.trim().is_empty() {
                    return Err(registry_error(format!(
                        "node '{}' has a field with an empty name",
                        node.label
                    )));
                }
                if field.property.contains(KEY_SEPARATOR) {
                    return Err(registry_error(format!(
                        "property '{}' on node '{}' cannot contain '{}'",
                        field.property, node.label, KEY_SEPARATOR
                    )));
                }
                if !properties.insert(field.property.as_str()) {
                    return Err(registry_error(format!(
                        "duplicate property '{}' on node '{}'",
                        field.property, node.label
                    )));
                }
            }
        }

        Ok(SchemaRegistry { nodes: self.nodes })
    }
}
