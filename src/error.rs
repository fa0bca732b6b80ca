//! Error handling module
//!
//! Provides the error types shared by the connection lifecycle and the
//! migration engine. Connection-level errors are fatal and bubble up to the
//! caller; per-directive migration failures are values, never `Err`.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Graph store backends the adapter knows how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseVariant {
    Neo4j,
}

impl DatabaseVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseVariant::Neo4j => "neo4j",
        }
    }
}

impl fmt::Display for DatabaseVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter-wide error type
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Missing required credentials for {variant}: {}", join(.missing))]
    CredentialsMissing {
        missing: BTreeSet<String>,
        variant: DatabaseVariant,
    },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Failed to connect to {variant} instance: {message}")]
    Connection {
        variant: DatabaseVariant,
        message: String,
    },

    /// Informational: `connect()` found a healthy live connection and did nothing
    #[error("A live {0} connection already exists")]
    AlreadyConnected(DatabaseVariant),

    #[error("Connection not established: {0}")]
    NotConnected(String),

    #[error("Invalid schema registry: {0}")]
    Registry(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::CredentialsMissing { .. } => "CREDENTIALS_MISSING",
            AdapterError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            AdapterError::Connection { .. } => "CONNECTION_ERROR",
            AdapterError::AlreadyConnected(_) => "ALREADY_CONNECTED",
            AdapterError::NotConnected(_) => "NOT_CONNECTED",
            AdapterError::Registry(_) => "REGISTRY_ERROR",
            AdapterError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Everything except the already-connected signal leaves the adapter unusable
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AdapterError::AlreadyConnected(_))
    }
}

fn join(items: &BTreeSet<String>) -> String {
    items.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Errors raised by a store backend
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to construct driver: {0}")]
    Construction(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("Driver has been closed")]
    Closed,

    #[error(transparent)]
    Neo4j(#[from] neo4rs::Error),
}

/// A single directive that could not be applied
///
/// Never raised; the executor folds it into the outcome map.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
#[error("{message}")]
pub struct MigrationError {
    pub message: String,
}

impl MigrationError {
    pub const FALLBACK: &'static str = "Failed to apply schema directive";

    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::default();
        }
        Self { message }
    }
}

impl Default for MigrationError {
    fn default() -> Self {
        Self {
            message: Self::FALLBACK.to_string(),
        }
    }
}

/// Result type alias for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Helper function to create a connection error
pub fn connection_error(variant: DatabaseVariant, msg: impl Into<String>) -> AdapterError {
    AdapterError::Connection {
        variant,
        message: msg.into(),
    }
}

/// Helper function to create a registry error
pub fn registry_error(msg: impl Into<String>) -> AdapterError {
    AdapterError::Registry(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_error_message() {
        let err = connection_error(DatabaseVariant::Neo4j, "connection refused");
        assert_eq!(
            err.to_string(),
            "Failed to connect to neo4j instance: connection refused"
        );
        assert_eq!(err.code(), "CONNECTION_ERROR");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_already_connected_is_not_fatal() {
        let err = AdapterError::AlreadyConnected(DatabaseVariant::Neo4j);
        assert!(!err.is_fatal());
        assert_eq!(err.code(), "ALREADY_CONNECTED");
    }

    #[test]
    fn test_credentials_missing_lists_sorted_names() {
        let missing: BTreeSet<String> = ["username", "database"]
            .into_iter()
            .map(String::from)
            .collect();
        let err = AdapterError::CredentialsMissing {
            missing,
            variant: DatabaseVariant::Neo4j,
        };
        assert_eq!(
            err.to_string(),
            "Missing required credentials for neo4j: database, username"
        );
    }

    #[test]
    fn test_migration_error_falls_back_on_blank_message() {
        assert_eq!(MigrationError::new("  ").message, MigrationError::FALLBACK);
        assert_eq!(MigrationError::new("boom").to_string(), "boom");
    }
}
