//! kenec-graph - schema migration and connection lifecycle for the news graph
//!
//! Keeps one verified connection to the graph store and turns a declarative
//! node model into idempotent type, constraint and index directives.

pub mod adapter;
pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod migration;
pub mod registry;
pub mod store;
pub mod typemap;

pub use adapter::{GraphAdapter, Neo4jAdapter};
pub use auth::DatabaseAuth;
pub use config::Settings;
pub use connection::{ConnectionInfo, ConnectionManager, ConnectionState};
pub use error::{AdapterError, AdapterResult, DatabaseVariant, DriverError, MigrationError};
pub use migration::{ConstraintPlanner, MigrationExecutor, MigrationOutcome, MigrationReport};
pub use registry::{ConstraintKind, NodeDescriptor, SchemaRegistry};
