//! Graph store backends
//!
//! The connection manager and the migration executor only see the
//! [`GraphDriver`] and [`DriverFactory`] traits. Each backend provides both:
//! - `neo4j`: pooled Bolt connections through `neo4rs`
//! - `memory`: an in-process store for dry runs and tests

pub mod memory;
pub mod neo4j;

use crate::auth::DatabaseAuth;
use crate::error::{DatabaseVariant, DriverError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub use memory::{MemoryDriverFactory, MemoryStore, StatementFault};
pub use neo4j::Neo4jDriverFactory;

/// GQL status reported for a statement that completed with no notification
pub const GQL_STATUS_SUCCESS: &str = "00000";

/// GQL status reported when a schema statement was a no-op
pub const GQL_STATUS_NO_CHANGE: &str = "00N70";

/// Result summary for a single statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementSummary {
    pub gql_status: String,
    pub status_description: Option<String>,
}

impl StatementSummary {
    pub fn new(gql_status: impl Into<String>, status_description: Option<String>) -> Self {
        Self {
            gql_status: gql_status.into(),
            status_description,
        }
    }

    pub fn success() -> Self {
        Self::new(GQL_STATUS_SUCCESS, None)
    }

    /// GQL status class `00` is successful completion
    pub fn is_success(&self) -> bool {
        self.gql_status.starts_with("00")
    }
}

/// A live handle to the graph store
///
/// Handles are shared (`Arc`) by concurrent migration tasks; only the
/// connection manager replaces or closes them.
#[async_trait]
pub trait GraphDriver: Send + Sync {
    /// Identity of this handle, stable for its whole lifetime
    fn id(&self) -> Uuid;

    /// Read-only liveness probe
    async fn verify_connectivity(&self) -> Result<(), DriverError>;

    /// Read-only probe that the configured credentials are accepted
    async fn verify_authentication(&self) -> Result<(), DriverError>;

    /// Run one schema statement in its own session
    ///
    /// `Ok(None)` means the store returned no usable result summary.
    async fn run_schema(&self, statement: &str) -> Result<Option<StatementSummary>, DriverError>;

    /// Release the handle's resources
    async fn close(&self) -> Result<(), DriverError>;
}

/// Builds new handles from connection parameters
#[async_trait]
pub trait DriverFactory: Send + Sync {
    fn variant(&self) -> DatabaseVariant;

    async fn create(&self, auth: &DatabaseAuth) -> Result<Arc<dyn GraphDriver>, DriverError>;
}
