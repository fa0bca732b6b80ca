//! Application configuration module
//!
//! Handles loading configuration from environment variables (and a `.env`
//! file when one is present).

use crate::auth::DatabaseAuth;
use crate::error::{AdapterError, DatabaseVariant};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Pool tuning for the store driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub fetch_size: usize,
    /// Upper bound for building the pool and for each verification probe
    pub probe_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            fetch_size: 200,
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// Raw store credentials as found in the environment
///
/// Required values stay `None` when absent so they can be reported together.
#[derive(Clone, Default)]
pub struct StoreConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub realm: Option<String>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .field("realm", &self.realm)
            .finish()
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreConfig,
    pub pool: PoolConfig,
    pub migrate_on_connect: bool,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `load` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = StoreConfig {
            uri: lookup("NEO4J_URI"),
            username: lookup("NEO4J_USERNAME"),
            password: lookup("NEO4J_PASSWORD"),
            database: lookup("NEO4J_DATABASE_NAME"),
            realm: lookup("NEO4J_REALM"),
        };

        let defaults = PoolConfig::default();
        let pool = PoolConfig {
            max_connections: parse_or(&lookup, "NEO4J_MAX_CONNECTIONS", defaults.max_connections)?,
            fetch_size: parse_or(&lookup, "NEO4J_FETCH_SIZE", defaults.fetch_size)?,
            probe_timeout: Duration::from_secs(parse_or(
                &lookup,
                "NEO4J_PROBE_TIMEOUT_SECS",
                defaults.probe_timeout.as_secs() as usize,
            )? as u64),
        };

        let migrate_on_connect = match lookup("MIGRATE_ON_CONNECT") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!("MIGRATE_ON_CONNECT must be a boolean, got '{}'", raw))
            })?,
            None => true,
        };

        Ok(Self {
            store,
            pool,
            migrate_on_connect,
        })
    }

    /// Turn the raw credentials into validated [`DatabaseAuth`]
    ///
    /// Every absent required parameter is reported at once, before any
    /// validation or connection attempt.
    pub fn database_auth(&self) -> Result<DatabaseAuth, AdapterError> {
        let store = &self.store;
        let mut missing = BTreeSet::new();
        for (name, value) in [
            ("uri", &store.uri),
            ("username", &store.username),
            ("password", &store.password),
            ("database", &store.database),
        ] {
            if value.is_none() {
                missing.insert(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(AdapterError::CredentialsMissing {
                missing,
                variant: DatabaseVariant::Neo4j,
            });
        }

        DatabaseAuth::new(
            store.uri.clone().unwrap_or_default(),
            store.username.clone().unwrap_or_default(),
            store.password.clone().unwrap_or_default(),
            store.database.clone().unwrap_or_default(),
            store.realm.clone(),
        )
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidValue(format!(
                "{} must be a positive integer, got '{}'",
                key, raw
            ))),
        },
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.fetch_size, 200);
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_probe_timeout_from_environment() {
        let settings = settings_from(&[("NEO4J_PROBE_TIMEOUT_SECS", "3")]).unwrap();
        assert_eq!(settings.pool.probe_timeout, Duration::from_secs(3));

        assert!(settings_from(&[("NEO4J_PROBE_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_load_full_environment() {
        let settings = settings_from(&[
            ("NEO4J_URI", "neo4j://localhost:7687"),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "secret"),
            ("NEO4J_DATABASE_NAME", "news"),
            ("NEO4J_MAX_CONNECTIONS", "4"),
            ("MIGRATE_ON_CONNECT", "false"),
        ])
        .unwrap();

        assert_eq!(settings.pool.max_connections, 4);
        assert!(!settings.migrate_on_connect);

        let auth = settings.database_auth().unwrap();
        assert_eq!(auth.database, "news");
        assert_eq!(auth.realm, None);
    }

    #[test]
    fn test_missing_credentials_are_reported_together() {
        let settings = settings_from(&[("NEO4J_URI", "neo4j://localhost:7687")]).unwrap();

        match settings.database_auth() {
            Err(AdapterError::CredentialsMissing { missing, variant }) => {
                let missing: Vec<_> = missing.into_iter().collect();
                assert_eq!(missing, vec!["database", "password", "username"]);
                assert_eq!(variant, DatabaseVariant::Neo4j);
            }
            other => panic!("expected CredentialsMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_numeric_value() {
        let result = settings_from(&[("NEO4J_FETCH_SIZE", "lots")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_pool_sizes_are_rejected() {
        for key in ["NEO4J_MAX_CONNECTIONS", "NEO4J_FETCH_SIZE", "NEO4J_PROBE_TIMEOUT_SECS"] {
            match settings_from(&[(key, "0")]) {
                Err(ConfigError::InvalidValue(message)) => {
                    assert!(message.contains(key));
                    assert!(message.contains("positive integer"));
                }
                other => panic!("expected InvalidValue for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_blank_realm_is_rejected_not_ignored() {
        let settings = settings_from(&[
            ("NEO4J_URI", "neo4j://localhost:7687"),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "secret"),
            ("NEO4J_DATABASE_NAME", "news"),
            ("NEO4J_REALM", "   "),
        ])
        .unwrap();

        let err = settings.database_auth().unwrap_err();
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
        assert!(err.to_string().contains("Realm cannot be empty"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = settings_from(&[("NEO4J_PASSWORD", "hunter2")]).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
    }
}
