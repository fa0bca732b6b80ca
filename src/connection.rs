//! Graph Store Connection Manager
//!
//! Owns the single live store handle: establishes it, verifies it, reuses it
//! while healthy and replaces it once it goes stale.

use crate::auth::DatabaseAuth;
use crate::error::{connection_error, AdapterError, AdapterResult, DatabaseVariant, DriverError};
use crate::store::{DriverFactory, GraphDriver};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Uninitialized,
    Connected,
    /// Was connected, then failed a liveness or authentication probe
    Stale,
    Closed,
}

/// The live handle together with when it was verified
struct ManagedHandle {
    driver: Arc<dyn GraphDriver>,
    connected_at: DateTime<Utc>,
}

struct ManagerInner {
    state: ConnectionState,
    handle: Option<ManagedHandle>,
}

/// Public connection info (password never included)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub handle_id: Uuid,
    pub variant: DatabaseVariant,
    pub uri: String,
    pub database: String,
    pub user: String,
    pub state: ConnectionState,
    pub connected_at: DateTime<Utc>,
}

/// Connection Manager - owns at most one live store handle
pub struct ConnectionManager<F> {
    auth: DatabaseAuth,
    factory: F,
    inner: RwLock<ManagerInner>,
}

impl<F: DriverFactory> ConnectionManager<F> {
    pub fn new(auth: DatabaseAuth, factory: F) -> Self {
        Self {
            auth,
            factory,
            inner: RwLock::new(ManagerInner {
                state: ConnectionState::Uninitialized,
                handle: None,
            }),
        }
    }

    pub fn variant(&self) -> DatabaseVariant {
        self.factory.variant()
    }

    /// Connect to the store, or confirm the existing connection is healthy
    ///
    /// Returns `AdapterError::AlreadyConnected` when the current handle passes
    /// both probes; that signal is informational, not a failure.
    pub async fn connect(&self) -> AdapterResult<ConnectionInfo> {
        let mut inner = self.inner.write().await;

        if inner.state == ConnectionState::Connected {
            if let Some(current) = &inner.handle {
                let (live, authenticated) = probe(current.driver.as_ref()).await;
                if live.is_ok() && authenticated.is_ok() {
                    debug!("Connection {} is healthy, nothing to do", current.driver.id());
                    return Err(AdapterError::AlreadyConnected(self.variant()));
                }

                if let Err(e) = &live {
                    warn!("Connection {} failed liveness probe: {}", current.driver.id(), e);
                }
                if let Err(e) = &authenticated {
                    warn!("Connection {} failed authentication probe: {}", current.driver.id(), e);
                }
            }

            inner.state = ConnectionState::Stale;
            if let Some(stale) = inner.handle.take() {
                close_quietly(stale.driver.as_ref()).await;
            }
        }

        let driver = self
            .factory
            .create(&self.auth)
            .await
            .map_err(|e| connection_error(self.variant(), e.to_string()))?;

        let (live, authenticated) = probe(driver.as_ref()).await;
        // Liveness failure is reported ahead of an authentication failure
        let verified = match (live, authenticated) {
            (Err(e), _) => Err(diagnostic(e, "Failure in connection")),
            (Ok(()), Err(e)) => Err(diagnostic(e, "Failure in authentication")),
            (Ok(()), Ok(())) => Ok(()),
        };
        if let Err(message) = verified {
            close_quietly(driver.as_ref()).await;
            return Err(connection_error(self.variant(), message));
        }

        let handle = ManagedHandle {
            driver,
            connected_at: Utc::now(),
        };
        let info = self.describe(&handle, ConnectionState::Connected);
        inner.handle = Some(handle);
        inner.state = ConnectionState::Connected;

        info!(
            "Connected to {} at {} ({})",
            info.variant,
            self.auth.to_display_string(),
            info.handle_id
        );
        Ok(info)
    }

    /// The live handle; only valid after a successful `connect()`
    pub async fn handle(&self) -> AdapterResult<Arc<dyn GraphDriver>> {
        let inner = self.inner.read().await;
        match (&inner.state, &inner.handle) {
            (ConnectionState::Connected, Some(handle)) => Ok(handle.driver.clone()),
            (state, _) => Err(AdapterError::NotConnected(format!(
                "no live {} connection (state: {:?})",
                self.variant(),
                state
            ))),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state
    }

    pub async fn info(&self) -> Option<ConnectionInfo> {
        let inner = self.inner.read().await;
        inner
            .handle
            .as_ref()
            .map(|handle| self.describe(handle, inner.state))
    }

    /// Close the live handle, if any
    ///
    /// Close failures are logged; the manager ends up `Closed` regardless.
    pub async fn close(&self) {
        let mut inner = self.inner.write().await;
        let Some(handle) = inner.handle.take() else {
            debug!("No live connection to close");
            return;
        };
        close_quietly(handle.driver.as_ref()).await;
        inner.state = ConnectionState::Closed;
        info!("Disconnected from {} ({})", self.variant(), handle.driver.id());
    }

    fn describe(&self, handle: &ManagedHandle, state: ConnectionState) -> ConnectionInfo {
        ConnectionInfo {
            handle_id: handle.driver.id(),
            variant: self.variant(),
            uri: self.auth.uri.clone(),
            database: self.auth.database.clone(),
            user: self.auth.username.clone(),
            state,
            connected_at: handle.connected_at,
        }
    }
}

/// Run both probes concurrently and wait for both
async fn probe(driver: &dyn GraphDriver) -> (Result<(), DriverError>, Result<(), DriverError>) {
    tokio::join!(driver.verify_connectivity(), driver.verify_authentication())
}

async fn close_quietly(driver: &dyn GraphDriver) {
    if let Err(e) = driver.close().await {
        debug!("Failed to close existing handle {}: {}", driver.id(), e);
    }
}

fn diagnostic(error: DriverError, fallback: &str) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
