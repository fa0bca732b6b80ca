//! Constraint planner
//!
//! Generates idempotent Cypher schema statements from the schema registry.

use crate::registry::{ConstraintKind, FieldDescriptor, SchemaRegistry, KEY_SEPARATOR};
use crate::typemap::{map_type, StoreType};
use serde::Serialize;
use std::fmt;

/// What a directive establishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    /// Property type constraint
    Type,
    /// Constraint or index chosen from the field's metadata
    Constraint(ConstraintKind),
}

impl DirectiveKind {
    /// Suffix used in the directive key
    pub fn key_suffix(&self) -> &'static str {
        match self {
            DirectiveKind::Type => "type",
            DirectiveKind::Constraint(ConstraintKind::Indexed) => "index",
            DirectiveKind::Constraint(_) => "constraint",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::Type => f.write_str("TYPE_CONSTRAINT"),
            DirectiveKind::Constraint(kind) => f.write_str(kind.as_str()),
        }
    }
}

/// A single schema statement targeting one label/property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDirective {
    /// `label::property::{type|constraint|index}`
    pub key: String,
    /// Escaped constraint/index name
    pub directive_name: String,
    pub kind: DirectiveKind,
    pub statement: String,
}

/// Escape an identifier for interpolation inside Cypher backticks
pub fn escape_identifier(raw: &str) -> String {
    raw.replace("\\u0060", "`").replace('`', "``")
}

fn quoted(raw: &str) -> String {
    format!("`{}`", escape_identifier(raw))
}

pub struct ConstraintPlanner;

impl ConstraintPlanner {
    /// Plan every directive for the registry, in registry order
    pub fn plan(registry: &SchemaRegistry) -> Vec<SchemaDirective> {
        registry.fields().flat_map(Self::plan_field).collect()
    }

    /// At most one type directive and one constraint/index directive per field
    pub fn plan_field(field: &FieldDescriptor) -> Vec<SchemaDirective> {
        let mut directives = Vec::with_capacity(2);

        if let Some(store_type) = map_type(&field.semantic_type) {
            directives.push(Self::type_directive(field, &store_type));
        }

        // BTreeSet iterates in priority order, so the first kind wins
        if let Some(kind) = field.constraint_kinds.iter().next() {
            directives.push(Self::constraint_directive(field, *kind));
        }

        directives
    }

    fn key(field: &FieldDescriptor, kind: DirectiveKind) -> String {
        [field.label.as_str(), field.property.as_str(), kind.key_suffix()].join(KEY_SEPARATOR)
    }

    fn type_directive(field: &FieldDescriptor, store_type: &StoreType) -> SchemaDirective {
        let raw_name = format!("type_{}_{}", field.label, field.property);
        let statement = format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS :: {}",
            quoted(&raw_name),
            quoted(&field.label),
            quoted(&field.property),
            escape_identifier(&store_type.to_string())
        );

        SchemaDirective {
            key: Self::key(field, DirectiveKind::Type),
            directive_name: escape_identifier(&raw_name),
            kind: DirectiveKind::Type,
            statement,
        }
    }

    fn constraint_directive(field: &FieldDescriptor, kind: ConstraintKind) -> SchemaDirective {
        let raw_name = format!("{}_{}", field.label, field.property);
        let name = quoted(&raw_name);
        let label = quoted(&field.label);
        let property = quoted(&field.property);

        let statement = match kind {
            ConstraintKind::PrimaryKey => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS NODE KEY",
                name, label, property
            ),
            ConstraintKind::UniqueIndexed | ConstraintKind::Unique => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                name, label, property
            ),
            ConstraintKind::UniqueRequired => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE (n.{} IS NOT NULL AND n.{} IS UNIQUE)",
                name, label, property, property
            ),
            ConstraintKind::Indexed => format!(
                "CREATE RANGE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{})",
                name, label, property
            ),
            ConstraintKind::Required => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS NOT NULL",
                name, label, property
            ),
        };

        let directive_kind = DirectiveKind::Constraint(kind);
        SchemaDirective {
            key: Self::key(field, directive_kind),
            directive_name: escape_identifier(&raw_name),
            kind: directive_kind,
            statement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConstraintFlags, NodeDescriptor};
    use crate::typemap::SemanticType;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn registry(node: NodeDescriptor) -> SchemaRegistry {
        SchemaRegistry::builder().node(node).build().unwrap()
    }

    #[test]
    fn test_article_url_unique() {
        let registry = registry(NodeDescriptor::new("Article").field_with(
            "url",
            SemanticType::optional(SemanticType::Url),
            [ConstraintKind::Unique],
        ));

        let directives = ConstraintPlanner::plan(&registry);
        let keys: Vec<_> = directives.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["Article::url::type", "Article::url::constraint"]);

        assert_eq!(
            directives[0].statement,
            "CREATE CONSTRAINT `type_Article_url` IF NOT EXISTS FOR (n:`Article`) REQUIRE n.`url` IS :: STRING"
        );
        assert_eq!(directives[1].kind, DirectiveKind::Constraint(ConstraintKind::Unique));
        assert_eq!(
            directives[1].statement,
            "CREATE CONSTRAINT `Article_url` IF NOT EXISTS FOR (n:`Article`) REQUIRE n.`url` IS UNIQUE"
        );
    }

    #[test]
    fn test_over_specified_field_yields_one_constraint() {
        let flags = ConstraintFlags {
            unique: true,
            indexed: true,
            existence: true,
        };
        let registry = registry(NodeDescriptor::new("Entity").field_flagged("word", SemanticType::String, flags));

        let directives = ConstraintPlanner::plan(&registry);
        let constraints: Vec<_> = directives
            .iter()
            .filter(|d| d.kind != DirectiveKind::Type)
            .collect();

        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].kind, DirectiveKind::Constraint(ConstraintKind::PrimaryKey));
        assert!(constraints[0].statement.ends_with("IS NODE KEY"));
    }

    #[test]
    fn test_priority_order_between_lower_kinds() {
        let field = NodeDescriptor::new("Source")
            .field_with("name", SemanticType::String, [ConstraintKind::Required, ConstraintKind::Indexed])
            .fields
            .remove(0);

        let directives = ConstraintPlanner::plan_field(&field);
        assert_eq!(directives[1].key, "Source::name::index");
        assert_eq!(
            directives[1].statement,
            "CREATE RANGE INDEX `Source_name` IF NOT EXISTS FOR (n:`Source`) ON (n.`name`)"
        );
    }

    #[test]
    fn test_unique_required_statement() {
        let field = NodeDescriptor::new("Entity")
            .field_with("word", SemanticType::Map, [ConstraintKind::UniqueRequired])
            .fields
            .remove(0);

        let directives = ConstraintPlanner::plan_field(&field);
        // Map has no store type, so only the constraint is planned
        assert_eq!(directives.len(), 1);
        assert_eq!(
            directives[0].statement,
            "CREATE CONSTRAINT `Entity_word` IF NOT EXISTS FOR (n:`Entity`) REQUIRE (n.`word` IS NOT NULL AND n.`word` IS UNIQUE)"
        );
    }

    #[test]
    fn test_unsupported_types_are_skipped() {
        let registry = registry(
            NodeDescriptor::new("Article")
                .field("metadata", SemanticType::optional(SemanticType::Map))
                .field("anything", SemanticType::Any),
        );
        assert!(ConstraintPlanner::plan(&registry).is_empty());
    }

    #[test]
    fn test_identifiers_are_escaped() {
        let registry = registry(NodeDescriptor::new("Bad`Label").field_with(
            "we`ird\\u0060",
            SemanticType::Integer,
            [ConstraintKind::Required],
        ));

        let directives = ConstraintPlanner::plan(&registry);
        assert_eq!(directives[0].directive_name, "type_Bad``Label_we``ird``");
        assert_eq!(
            directives[1].statement,
            "CREATE CONSTRAINT `Bad``Label_we``ird``` IF NOT EXISTS FOR (n:`Bad``Label`) REQUIRE n.`we``ird``` IS NOT NULL"
        );
        // The key keeps the raw names
        assert_eq!(directives[1].key, "Bad`Label::we`ird\\u0060::constraint");
    }

    #[test]
    fn test_plan_is_deterministic() {
        let registry = SchemaRegistry::news_graph();
        let first: HashSet<_> = ConstraintPlanner::plan(&registry)
            .into_iter()
            .map(|d| (d.key, d.statement))
            .collect();
        let second: HashSet<_> = ConstraintPlanner::plan(&registry)
            .into_iter()
            .map(|d| (d.key, d.statement))
            .collect();

        assert_eq!(first, second);
        assert_eq!(ConstraintPlanner::plan(&registry), ConstraintPlanner::plan(&registry));
    }

    #[test]
    fn test_news_graph_keys_are_unique() {
        let directives = ConstraintPlanner::plan(&SchemaRegistry::news_graph());
        let keys: HashSet<_> = directives.iter().map(|d| d.key.clone()).collect();
        assert_eq!(keys.len(), directives.len());
        assert!(keys.contains("Article::id::constraint"));
        assert!(!keys.contains("Article::id::type"));
        assert!(keys.contains("Article::authors::type"));
        assert!(!keys.contains("Article::images::type"));
    }
}
