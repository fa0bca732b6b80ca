//! In-process graph store
//!
//! Remembers which constraints and indexes exist by name, so re-applying a
//! directive is a no-op exactly as on a real server. Unit tests get failure
//! switches and counters on top, to rehearse stale connections and partial
//! migrations without a running database.

use crate::auth::DatabaseAuth;
use crate::error::{DatabaseVariant, DriverError};
use crate::store::{DriverFactory, GraphDriver, StatementSummary, GQL_STATUS_NO_CHANGE};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How a statement matching an injected pattern misbehaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementFault {
    /// The driver raises an error
    Error(String),
    /// The statement completes with a non-success GQL status
    Status {
        gql_status: String,
        description: Option<String>,
    },
    /// The driver returns no result summary at all
    NoSummary,
}

/// Shared server-side state; outlives individual handles
#[derive(Debug, Default)]
pub struct MemoryStore {
    schema: RwLock<BTreeMap<String, String>>,
    faults: RwLock<Vec<(String, StatementFault)>>,
    liveness_down: AtomicBool,
    auth_rejected: AtomicBool,
    close_fails: AtomicBool,
    construction_fails: AtomicBool,
    generation: AtomicUsize,
    handles_created: AtomicUsize,
    handles_closed: AtomicUsize,
    statements_run: AtomicUsize,
    probes_run: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names of every constraint and index currently defined
    pub async fn schema_objects(&self) -> Vec<String> {
        self.schema.read().await.keys().cloned().collect()
    }

    async fn fault_for(&self, statement: &str) -> Option<StatementFault> {
        self.faults
            .read()
            .await
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
            .map(|(_, fault)| fault.clone())
    }

    async fn apply(&self, statement: &str) -> Result<Option<StatementSummary>, DriverError> {
        self.statements_run.fetch_add(1, Ordering::SeqCst);

        match self.fault_for(statement).await {
            Some(StatementFault::Error(message)) => return Err(DriverError::Statement(message)),
            Some(StatementFault::Status {
                gql_status,
                description,
            }) => return Ok(Some(StatementSummary::new(gql_status, description))),
            Some(StatementFault::NoSummary) => return Ok(None),
            None => {}
        }

        let trimmed = statement.trim_start();
        if !(trimmed.starts_with("CREATE CONSTRAINT") || trimmed.starts_with("CREATE RANGE INDEX")) {
            return Ok(Some(StatementSummary::new(
                "42I06",
                Some("Unsupported schema statement".to_string()),
            )));
        }

        let Some(name) = schema_object_name(trimmed) else {
            return Ok(Some(StatementSummary::new(
                "42I06",
                Some("Schema statement has no quoted name".to_string()),
            )));
        };

        let mut schema = self.schema.write().await;
        if schema.contains_key(&name) {
            return Ok(Some(StatementSummary::new(GQL_STATUS_NO_CHANGE, None)));
        }
        schema.insert(name, statement.to_string());
        Ok(Some(StatementSummary::success()))
    }
}

/// Failure switches and counters for unit tests
#[cfg(test)]
impl MemoryStore {
    pub fn set_liveness(&self, up: bool) {
        self.liveness_down.store(!up, Ordering::SeqCst);
    }

    pub fn set_auth_accepted(&self, accepted: bool) {
        self.auth_rejected.store(!accepted, Ordering::SeqCst);
    }

    pub fn set_close_fails(&self, fails: bool) {
        self.close_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_construction_fails(&self, fails: bool) {
        self.construction_fails.store(fails, Ordering::SeqCst);
    }

    /// Sever every existing handle, as a server restart would; new handles work
    pub fn drop_connections(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Make every statement containing `pattern` fail the given way
    pub async fn inject_fault(&self, pattern: impl Into<String>, fault: StatementFault) {
        self.faults.write().await.push((pattern.into(), fault));
    }

    pub fn handles_created(&self) -> usize {
        self.handles_created.load(Ordering::SeqCst)
    }

    pub fn handles_closed(&self) -> usize {
        self.handles_closed.load(Ordering::SeqCst)
    }

    pub fn statements_run(&self) -> usize {
        self.statements_run.load(Ordering::SeqCst)
    }

    /// Liveness and authentication probes received, across all handles
    pub fn probes_run(&self) -> usize {
        self.probes_run.load(Ordering::SeqCst)
    }
}

/// First backtick-quoted identifier, with doubled backticks unescaped
fn schema_object_name(statement: &str) -> Option<String> {
    let start = statement.find('`')?;
    let mut chars = statement[start + 1..].chars().peekable();
    let mut name = String::new();
    while let Some(c) = chars.next() {
        if c == '`' {
            if chars.peek() == Some(&'`') {
                chars.next();
                name.push('`');
            } else {
                return Some(name);
            }
        } else {
            name.push(c);
        }
    }
    None
}

/// Handle onto a [`MemoryStore`]
pub struct MemoryDriver {
    id: Uuid,
    store: Arc<MemoryStore>,
    generation: usize,
    closed: AtomicBool,
}

impl MemoryDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        if self.store.generation.load(Ordering::SeqCst) != self.generation {
            return Err(DriverError::Unavailable("connection reset by the store".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphDriver for MemoryDriver {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn verify_connectivity(&self) -> Result<(), DriverError> {
        self.store.probes_run.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        tokio::task::yield_now().await;
        if self.store.liveness_down.load(Ordering::SeqCst) {
            return Err(DriverError::Unavailable("memory store is not reachable".to_string()));
        }
        Ok(())
    }

    async fn verify_authentication(&self) -> Result<(), DriverError> {
        self.store.probes_run.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        tokio::task::yield_now().await;
        if self.store.auth_rejected.load(Ordering::SeqCst) {
            return Err(DriverError::Authentication(
                "the client is unauthorized due to authentication failure".to_string(),
            ));
        }
        Ok(())
    }

    async fn run_schema(&self, statement: &str) -> Result<Option<StatementSummary>, DriverError> {
        self.ensure_open()?;
        tokio::task::yield_now().await;
        self.store.apply(statement).await
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.store.close_fails.load(Ordering::SeqCst) {
            return Err(DriverError::Unavailable("failed to close memory handle".to_string()));
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        self.store.handles_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Creates handles onto one shared [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryDriverFactory {
    store: Arc<MemoryStore>,
}

impl MemoryDriverFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

#[async_trait]
impl DriverFactory for MemoryDriverFactory {
    fn variant(&self) -> DatabaseVariant {
        DatabaseVariant::Neo4j
    }

    async fn create(&self, _auth: &DatabaseAuth) -> Result<Arc<dyn GraphDriver>, DriverError> {
        if self.store.construction_fails.load(Ordering::SeqCst) {
            return Err(DriverError::Construction("Unable to retrieve routing information".to_string()));
        }
        self.store.handles_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryDriver {
            id: Uuid::new_v4(),
            store: self.store.clone(),
            generation: self.store.generation.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn auth() -> DatabaseAuth {
        DatabaseAuth::new("neo4j://localhost:7687", "neo4j", "pw", "neo4j", None).unwrap()
    }

    #[test]
    fn test_schema_object_name_unescapes_backticks() {
        assert_eq!(
            schema_object_name("CREATE CONSTRAINT `a``b` IF NOT EXISTS"),
            Some("a`b".to_string())
        );
        assert_eq!(schema_object_name("CREATE CONSTRAINT `open"), None);
        assert_eq!(schema_object_name("RETURN 1"), None);
    }

    #[tokio::test]
    async fn test_reapplying_is_a_no_op() {
        let store = MemoryStore::new();
        let driver = MemoryDriverFactory::new(store.clone()).create(&auth()).await.unwrap();
        let statement = "CREATE CONSTRAINT `Entity_id` IF NOT EXISTS FOR (n:`Entity`) REQUIRE n.`id` IS NODE KEY";

        let first = driver.run_schema(statement).await.unwrap().unwrap();
        let second = driver.run_schema(statement).await.unwrap().unwrap();

        assert_eq!(first, StatementSummary::success());
        assert_eq!(second.gql_status, GQL_STATUS_NO_CHANGE);
        assert_eq!(store.schema_objects().await, vec!["Entity_id".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new();
        store.inject_fault("`bad`", StatementFault::Error("boom".into())).await;
        store.inject_fault("`empty`", StatementFault::NoSummary).await;
        let driver = MemoryDriverFactory::new(store.clone()).create(&auth()).await.unwrap();

        assert!(driver.run_schema("CREATE CONSTRAINT `bad`").await.is_err());
        assert_eq!(driver.run_schema("CREATE CONSTRAINT `empty`").await.unwrap(), None);
        assert!(store.schema_objects().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_handle_refuses_work() {
        let store = MemoryStore::new();
        let driver = MemoryDriverFactory::new(store.clone()).create(&auth()).await.unwrap();

        driver.close().await.unwrap();
        assert!(matches!(driver.verify_connectivity().await, Err(DriverError::Closed)));
        assert_eq!(store.handles_closed(), 1);
    }

    #[tokio::test]
    async fn test_dropped_connections_only_affect_existing_handles() {
        let store = MemoryStore::new();
        let factory = MemoryDriverFactory::new(store.clone());
        let old = factory.create(&auth()).await.unwrap();

        store.drop_connections();
        let fresh = factory.create(&auth()).await.unwrap();

        assert!(matches!(old.verify_connectivity().await, Err(DriverError::Unavailable(_))));
        assert!(fresh.verify_connectivity().await.is_ok());
    }
}
