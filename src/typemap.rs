//! Semantic field type to store property type mapping
//!
//! Total and side-effect free: anything without a native store property type
//! maps to `None` and the caller simply emits no type directive for it.

use serde::Serialize;
use std::fmt;

/// Field type as declared by the data model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    String,
    /// URL fields are stored as strings
    Url,
    Integer,
    Float,
    Boolean,
    DateTime,
    Date,
    /// Time of day
    Time,
    Duration,
    Uuid,
    /// The `None` member of a union
    Null,
    Optional(Box<SemanticType>),
    /// Homogeneous list; `None` is an unparameterised list
    List(Option<Box<SemanticType>>),
    Map,
    Any,
    Union(Vec<SemanticType>),
    /// Any other named type the model refers to
    Named(String),
}

impl SemanticType {
    pub fn optional(inner: SemanticType) -> Self {
        SemanticType::Optional(Box::new(inner))
    }

    pub fn list_of(inner: SemanticType) -> Self {
        SemanticType::List(Some(Box::new(inner)))
    }
}

/// Property type understood by the store's type constraints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreType {
    String,
    Integer,
    Float,
    Boolean,
    ZonedDatetime,
    Date,
    ZonedTime,
    Duration,
    ListOf {
        element: Box<StoreType>,
        non_null: bool,
    },
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::String => f.write_str("STRING"),
            StoreType::Integer => f.write_str("INTEGER"),
            StoreType::Float => f.write_str("FLOAT"),
            StoreType::Boolean => f.write_str("BOOLEAN"),
            StoreType::ZonedDatetime => f.write_str("ZONED DATETIME"),
            StoreType::Date => f.write_str("DATE"),
            StoreType::ZonedTime => f.write_str("ZONED TIME"),
            StoreType::Duration => f.write_str("DURATION"),
            StoreType::ListOf { element, non_null } => {
                if *non_null {
                    write!(f, "LIST<{} NOT NULL>", element)
                } else {
                    write!(f, "LIST<{}>", element)
                }
            }
        }
    }
}

/// Map a semantic type to its store type, or `None` when unsupported
pub fn map_type(semantic: &SemanticType) -> Option<StoreType> {
    match semantic {
        SemanticType::Optional(inner) => map_type(inner),
        SemanticType::Union(members) => match members.as_slice() {
            [SemanticType::Null, inner] | [inner, SemanticType::Null]
                if *inner != SemanticType::Null =>
            {
                map_type(inner)
            }
            _ => None,
        },
        SemanticType::List(Some(inner)) => map_type(inner).map(|element| StoreType::ListOf {
            element: Box::new(element),
            non_null: true,
        }),
        SemanticType::String | SemanticType::Url => Some(StoreType::String),
        SemanticType::Integer => Some(StoreType::Integer),
        SemanticType::Float => Some(StoreType::Float),
        SemanticType::Boolean => Some(StoreType::Boolean),
        SemanticType::DateTime => Some(StoreType::ZonedDatetime),
        SemanticType::Date => Some(StoreType::Date),
        SemanticType::Time => Some(StoreType::ZonedTime),
        SemanticType::Duration => Some(StoreType::Duration),
        SemanticType::List(None)
        | SemanticType::Uuid
        | SemanticType::Null
        | SemanticType::Map
        | SemanticType::Any
        | SemanticType::Named(_) => None,
    }
}
