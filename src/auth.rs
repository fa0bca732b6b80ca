//! Store credentials
//!
//! `DatabaseAuth` is validated before an adapter is ever constructed, so an
//! invalid URI or empty username is rejected without touching the network.

use crate::error::AdapterError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Transport schemes the Neo4j driver accepts
pub const ALLOWED_SCHEMES: [&str; 6] = ["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"];

static REALM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("realm pattern is valid"));

/// Validated connection parameters for the graph store
#[derive(Clone, PartialEq, Eq, Validate)]
pub struct DatabaseAuth {
    #[validate(custom(function = "validate_store_uri"))]
    pub uri: String,

    #[validate(length(min = 1, message = "Neo4j username cannot be empty"))]
    pub username: String,

    /// Opaque secret; never logged or displayed
    pub password: String,

    #[validate(length(min = 1, message = "Database name cannot be empty"))]
    pub database: String,

    #[validate(custom(function = "validate_realm"))]
    pub realm: Option<String>,
}

impl DatabaseAuth {
    /// Trim and validate the given parameters
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        realm: Option<String>,
    ) -> Result<Self, AdapterError> {
        let auth = Self {
            uri: uri.into().trim().to_string(),
            username: username.into().trim().to_string(),
            password: password.into(),
            database: database.into().trim().to_string(),
            realm: realm.map(|r| r.trim().to_string()),
        };

        auth.validate()
            .map_err(|e| AdapterError::InvalidCredentials(e.to_string()))?;

        Ok(auth)
    }

    /// Connection string with the password masked, safe for logs
    pub fn to_display_string(&self) -> String {
        match url::Url::parse(&self.uri) {
            Ok(url) => format!(
                "{}://{}:****@{}:{}/{}",
                url.scheme(),
                self.username,
                url.host_str().unwrap_or_default(),
                url.port().map(|p| p.to_string()).unwrap_or_default(),
                self.database
            ),
            Err(_) => format!("{} ({}@{})", self.uri, self.username, self.database),
        }
    }
}

impl std::fmt::Debug for DatabaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseAuth")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"****")
            .field("database", &self.database)
            .field("realm", &self.realm)
            .finish()
    }
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

/// Scheme must be a supported transport; host and explicit port are required
fn validate_store_uri(uri: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(uri)
        .map_err(|e| invalid("invalid_uri", format!("Invalid Neo4j URI '{}': {}", uri, e)))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        let mut allowed = ALLOWED_SCHEMES.to_vec();
        allowed.sort_unstable();
        return Err(invalid(
            "invalid_scheme",
            format!(
                "Invalid Neo4j URI scheme '{}'. Must be one of: {}",
                parsed.scheme(),
                allowed.join(", ")
            ),
        ));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing_host", "Neo4j URI must include a host".to_string()));
    }

    if parsed.port().is_none() {
        return Err(invalid(
            "missing_port",
            "Neo4j URI must include an explicit port (e.g. :7687 or :7474)".to_string(),
        ));
    }

    Ok(())
}

fn validate_realm(realm: &str) -> Result<(), ValidationError> {
    if realm.is_empty() {
        return Err(invalid("empty_realm", "Realm cannot be empty if provided".to_string()));
    }
    if !REALM_PATTERN.is_match(realm) {
        return Err(invalid("invalid_realm", "Realm contains invalid characters".to_string()));
    }
    Ok(())
}
