//! Neo4j backend over Bolt, using the `neo4rs` connection pool

use crate::auth::DatabaseAuth;
use crate::config::PoolConfig;
use crate::error::{DatabaseVariant, DriverError};
use crate::store::{DriverFactory, GraphDriver, StatementSummary};
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const LIVENESS_QUERY: &str = "RETURN 1";
const AUTH_QUERY: &str = "CALL dbms.showCurrentUser()";

/// A pooled Neo4j handle
pub struct Neo4jDriver {
    id: Uuid,
    graph: Graph,
    probe_timeout: Duration,
    closed: AtomicBool,
}

impl Neo4jDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl GraphDriver for Neo4jDriver {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn verify_connectivity(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        within(self.probe_timeout, "Liveness probe", async {
            self.graph
                .run(query(LIVENESS_QUERY))
                .await
                .map_err(|e| DriverError::Unavailable(e.to_string()))
        })
        .await
    }

    async fn verify_authentication(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        within(self.probe_timeout, "Authentication probe", async {
            self.graph
                .run(query(AUTH_QUERY))
                .await
                .map_err(|e| DriverError::Authentication(e.to_string()))
        })
        .await
    }

    async fn run_schema(&self, statement: &str) -> Result<Option<StatementSummary>, DriverError> {
        self.ensure_open()?;
        // neo4rs does not surface GQL status objects; a statement that
        // completes without a server failure is a successful completion
        self.graph.run(query(statement)).await?;
        Ok(Some(StatementSummary::success()))
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DriverError::Closed);
        }
        // Pooled connections are released when the last clone of the graph drops
        debug!("Closed Neo4j handle {}", self.id);
        Ok(())
    }
}

/// Builds pooled `neo4rs` graphs
#[derive(Debug, Clone, Default)]
pub struct Neo4jDriverFactory {
    pool: PoolConfig,
}

impl Neo4jDriverFactory {
    pub fn new(pool: PoolConfig) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriverFactory for Neo4jDriverFactory {
    fn variant(&self) -> DatabaseVariant {
        DatabaseVariant::Neo4j
    }

    async fn create(&self, auth: &DatabaseAuth) -> Result<Arc<dyn GraphDriver>, DriverError> {
        if let Some(realm) = &auth.realm {
            debug!("Realm '{}' is not forwarded by the Bolt driver", realm);
        }

        let config = ConfigBuilder::default()
            .uri(auth.uri.as_str())
            .user(auth.username.as_str())
            .password(auth.password.as_str())
            .db(auth.database.as_str())
            .max_connections(self.pool.max_connections)
            .fetch_size(self.pool.fetch_size)
            .build()
            .map_err(|e| DriverError::Construction(e.to_string()))?;

        let graph = within(self.pool.probe_timeout, "Driver construction", async {
            Graph::connect(config)
                .await
                .map_err(|e| DriverError::Construction(e.to_string()))
        })
        .await?;

        Ok(Arc::new(Neo4jDriver {
            id: Uuid::new_v4(),
            graph,
            probe_timeout: self.pool.probe_timeout,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Bound a driver call; the driver itself retries with backoff for up to a minute
async fn within<T, F>(limit: Duration, what: &str, call: F) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| DriverError::Unavailable(format!("{} timed out after {:?}", what, limit)))?
}
