//! kenec-graph
//!
//! Connects to the configured graph store and, unless MIGRATE_ON_CONNECT is
//! off, brings its schema in line with the news graph model.

use kenec_graph::store::Neo4jDriverFactory;
use kenec_graph::{GraphAdapter, Neo4jAdapter, SchemaRegistry, Settings};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting kenec-graph...");

    let settings = Settings::load()?;
    info!("Configuration loaded successfully");

    let auth = settings.database_auth()?;
    let factory = Neo4jDriverFactory::new(settings.pool.clone());
    let adapter = Neo4jAdapter::new(auth, factory, SchemaRegistry::news_graph());

    match adapter.connect().await {
        Ok(info) => info!("Connection {} ready", info.handle_id),
        Err(e) if !e.is_fatal() => info!("{}", e),
        Err(e) => {
            error!("[{}] {}", e.code(), e);
            return Err(e.into());
        }
    }

    if !settings.migrate_on_connect {
        info!("MIGRATE_ON_CONNECT is off, skipping schema migration");
        adapter.close().await;
        return Ok(());
    }

    let report = adapter.migrate().await?;
    info!("Migration report: {}", serde_json::to_string_pretty(&report)?);
    if !report.is_complete_success() {
        for (key, err) in report.failed() {
            warn!("Directive {} was not applied: {}", key, err);
        }
    }

    adapter.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kenec_graph=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}
