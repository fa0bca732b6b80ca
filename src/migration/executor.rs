//! Migration executor
//!
//! Fans directives out as independent tasks against the live handle and
//! folds every result, failure or not, into a complete outcome report.

use crate::error::MigrationError;
use crate::migration::planner::SchemaDirective;
use crate::store::{GraphDriver, StatementSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const NO_SUMMARY: &str = "Migration statement returned no result summary";
const TASK_LOST: &str = "Migration task did not complete";

/// Outcome of a single directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Applied now, or already present
    Applied,
    Failed(MigrationError),
}

impl MigrationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationOutcome::Applied)
    }

    /// Classify what the store returned for a statement
    pub fn classify(result: Result<Option<StatementSummary>, String>) -> Self {
        match result {
            Ok(Some(summary)) if summary.is_success() => MigrationOutcome::Applied,
            Ok(Some(summary)) => MigrationOutcome::Failed(MigrationError::new(
                summary.status_description.unwrap_or_default(),
            )),
            Ok(None) => MigrationOutcome::Failed(MigrationError::new(NO_SUMMARY)),
            Err(message) => MigrationOutcome::Failed(MigrationError::new(message)),
        }
    }
}

/// Counts for a finished migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
}

/// Outcome of every directive, keyed by directive key
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub outcomes: BTreeMap<String, MigrationOutcome>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl MigrationReport {
    pub fn get(&self, key: &str) -> Option<&MigrationOutcome> {
        self.outcomes.get(key)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn applied(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_applied())
            .map(|(key, _)| key.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &MigrationError)> {
        self.outcomes.iter().filter_map(|(key, outcome)| match outcome {
            MigrationOutcome::Failed(err) => Some((key.as_str(), err)),
            MigrationOutcome::Applied => None,
        })
    }

    pub fn is_complete_success(&self) -> bool {
        self.outcomes.values().all(MigrationOutcome::is_applied)
    }

    pub fn summary(&self) -> MigrationSummary {
        let applied = self.applied().count();
        MigrationSummary {
            total: self.outcomes.len(),
            applied,
            failed: self.outcomes.len() - applied,
        }
    }
}

pub struct MigrationExecutor;

impl MigrationExecutor {
    /// Apply every directive concurrently
    ///
    /// Never fails: the report holds exactly one outcome per directive key.
    pub async fn execute(directives: Vec<SchemaDirective>, driver: Arc<dyn GraphDriver>) -> MigrationReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let keys: Vec<String> = directives.iter().map(|d| d.key.clone()).collect();

        let mut tasks = JoinSet::new();
        for directive in directives {
            let driver = driver.clone();
            tasks.spawn(async move {
                let result = driver
                    .run_schema(&directive.statement)
                    .await
                    .map_err(|e| e.to_string());
                (directive, MigrationOutcome::classify(result))
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((directive, outcome)) => {
                    match &outcome {
                        MigrationOutcome::Applied => {
                            debug!("Applied {} ({})", directive.key, directive.kind)
                        }
                        MigrationOutcome::Failed(err) => {
                            warn!("Failed to apply {} ({}): {}", directive.key, directive.kind, err)
                        }
                    }
                    outcomes.insert(directive.key, outcome);
                }
                Err(e) => warn!("Migration task aborted: {}", e),
            }
        }

        // A task that panicked never reported back; its key still gets an entry
        for key in keys {
            outcomes
                .entry(key)
                .or_insert_with(|| MigrationOutcome::Failed(MigrationError::new(TASK_LOST)));
        }

        let report = MigrationReport {
            outcomes,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let summary = report.summary();
        info!(
            "Migration finished: {} applied, {} failed ({} directives, {} ms)",
            summary.applied, summary.failed, summary.total, report.duration_ms
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DatabaseAuth;
    use crate::migration::planner::{ConstraintPlanner, DirectiveKind};
    use crate::registry::{ConstraintKind, NodeDescriptor, SchemaRegistry};
    use crate::store::{DriverFactory, MemoryDriverFactory, MemoryStore, StatementFault};
    use crate::typemap::SemanticType;
    use pretty_assertions::assert_eq;

    async fn driver(store: &Arc<MemoryStore>) -> Arc<dyn GraphDriver> {
        let auth = DatabaseAuth::new("bolt://localhost:7687", "neo4j", "pw", "neo4j", None).unwrap();
        MemoryDriverFactory::new(store.clone()).create(&auth).await.unwrap()
    }

    fn directive(n: usize) -> SchemaDirective {
        SchemaDirective {
            key: format!("Node{}::prop::constraint", n),
            directive_name: format!("Node{}_prop", n),
            kind: DirectiveKind::Constraint(ConstraintKind::Required),
            statement: format!(
                "CREATE CONSTRAINT `Node{n}_prop` IF NOT EXISTS FOR (n:`Node{n}`) REQUIRE n.`prop` IS NOT NULL"
            ),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            MigrationOutcome::classify(Ok(Some(StatementSummary::success()))),
            MigrationOutcome::Applied
        );
        assert_eq!(
            MigrationOutcome::classify(Ok(Some(StatementSummary::new("42N11", Some("already exists".into()))))),
            MigrationOutcome::Failed(MigrationError::new("already exists"))
        );
        assert_eq!(
            MigrationOutcome::classify(Ok(Some(StatementSummary::new("50N00", None)))),
            MigrationOutcome::Failed(MigrationError::default())
        );
        assert_eq!(
            MigrationOutcome::classify(Ok(None)),
            MigrationOutcome::Failed(MigrationError::new(NO_SUMMARY))
        );
        assert_eq!(
            MigrationOutcome::classify(Err("socket closed".into())),
            MigrationOutcome::Failed(MigrationError::new("socket closed"))
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_complete() {
        let store = MemoryStore::new();
        store
            .inject_fault("`Node3_prop`", StatementFault::Error("constraint conflicts".into()))
            .await;

        let directives: Vec<_> = (1..=5).map(directive).collect();
        let report = MigrationExecutor::execute(directives, driver(&store).await).await;

        assert_eq!(report.len(), 5);
        assert_eq!(report.summary().applied, 4);
        assert_eq!(report.summary().failed, 1);

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "Node3::prop::constraint");
        assert!(failed[0].1.message.contains("constraint conflicts"));
        assert!(!report.is_complete_success());
    }

    #[tokio::test]
    async fn test_every_kind_of_failure_is_recorded() {
        let store = MemoryStore::new();
        store.inject_fault("`Node1_prop`", StatementFault::NoSummary).await;
        store
            .inject_fault(
                "`Node2_prop`",
                StatementFault::Status {
                    gql_status: "22N01".into(),
                    description: Some("invalid property type".into()),
                },
            )
            .await;

        let report = MigrationExecutor::execute(vec![directive(1), directive(2)], driver(&store).await).await;

        assert_eq!(
            report.get("Node1::prop::constraint"),
            Some(&MigrationOutcome::Failed(MigrationError::new(NO_SUMMARY)))
        );
        assert_eq!(
            report.get("Node2::prop::constraint"),
            Some(&MigrationOutcome::Failed(MigrationError::new("invalid property type")))
        );
    }

    #[tokio::test]
    async fn test_reapplying_directives_stays_applied() {
        let store = MemoryStore::new();
        let registry = SchemaRegistry::builder()
            .node(NodeDescriptor::new("Article").field_with(
                "url",
                SemanticType::optional(SemanticType::Url),
                [ConstraintKind::Unique],
            ))
            .build()
            .unwrap();
        let handle = driver(&store).await;

        let first = MigrationExecutor::execute(ConstraintPlanner::plan(&registry), handle.clone()).await;
        let second = MigrationExecutor::execute(ConstraintPlanner::plan(&registry), handle).await;

        for report in [&first, &second] {
            assert_eq!(report.get("Article::url::type"), Some(&MigrationOutcome::Applied));
            assert_eq!(report.get("Article::url::constraint"), Some(&MigrationOutcome::Applied));
        }
        assert_eq!(
            store.schema_objects().await,
            vec!["Article_url".to_string(), "type_Article_url".to_string()]
        );
    }

    #[tokio::test]
    async fn test_closed_handle_fails_every_directive() {
        let store = MemoryStore::new();
        let handle = driver(&store).await;
        handle.close().await.unwrap();

        let report = MigrationExecutor::execute(vec![directive(1), directive(2)], handle).await;
        assert_eq!(report.len(), 2);
        assert_eq!(report.summary().failed, 2);
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert("A::x::type".to_string(), MigrationOutcome::Applied);
        outcomes.insert(
            "A::x::constraint".to_string(),
            MigrationOutcome::Failed(MigrationError::new("nope")),
        );
        let report = MigrationReport {
            outcomes,
            started_at: Utc::now(),
            duration_ms: 3,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"]["A::x::type"], "applied");
        assert_eq!(json["outcomes"]["A::x::constraint"]["failed"], "nope");
    }
}
