//! Adapter facade
//!
//! Puts the connection lifecycle and the migration engine behind two
//! operations, `connect()` and `migrate()`.

use crate::auth::DatabaseAuth;
use crate::connection::{ConnectionInfo, ConnectionManager, ConnectionState};
use crate::error::{AdapterResult, DatabaseVariant};
use crate::migration::{ConstraintPlanner, MigrationExecutor, MigrationReport};
use crate::registry::SchemaRegistry;
use crate::store::DriverFactory;
use async_trait::async_trait;
use tracing::{debug, info};

/// A graph store the application can connect to and migrate
#[async_trait]
pub trait GraphAdapter: Send + Sync {
    fn variant(&self) -> DatabaseVariant;

    /// Establish or re-verify the store connection
    async fn connect(&self) -> AdapterResult<ConnectionInfo>;

    /// Apply the schema registry to the connected store
    ///
    /// Requires a prior successful `connect()`; otherwise `NotConnected`.
    async fn migrate(&self) -> AdapterResult<MigrationReport>;

    /// Connect, tolerating an existing healthy connection, then migrate
    async fn prepare(&self) -> AdapterResult<MigrationReport> {
        match self.connect().await {
            Ok(_) => {}
            Err(e) if !e.is_fatal() => debug!("{}", e),
            Err(e) => return Err(e),
        }
        self.migrate().await
    }
}

/// Neo4j adapter over any handle factory
pub struct Neo4jAdapter<F> {
    connections: ConnectionManager<F>,
    registry: SchemaRegistry,
}

impl<F: DriverFactory> Neo4jAdapter<F> {
    pub fn new(auth: DatabaseAuth, factory: F, registry: SchemaRegistry) -> Self {
        Self {
            connections: ConnectionManager::new(auth, factory),
            registry,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub async fn state(&self) -> ConnectionState {
        self.connections.state().await
    }

    pub async fn info(&self) -> Option<ConnectionInfo> {
        self.connections.info().await
    }

    pub async fn close(&self) {
        self.connections.close().await
    }
}

#[async_trait]
impl<F: DriverFactory> GraphAdapter for Neo4jAdapter<F> {
    fn variant(&self) -> DatabaseVariant {
        self.connections.variant()
    }

    async fn connect(&self) -> AdapterResult<ConnectionInfo> {
        self.connections.connect().await
    }

    async fn migrate(&self) -> AdapterResult<MigrationReport> {
        let driver = self.connections.handle().await?;

        let directives = ConstraintPlanner::plan(&self.registry);
        info!(
            "Applying {} schema directives for {} node labels",
            directives.len(),
            self.registry.len()
        );

        Ok(MigrationExecutor::execute(directives, driver).await)
    }
}

impl<F> std::fmt::Debug for Neo4jAdapter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jAdapter")
            .field("nodes", &self.registry.len())
            .finish_non_exhaustive()
    }
}
