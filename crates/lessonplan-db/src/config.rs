use std::env;
use std::time::Duration;

use anyhow::{Result, bail};

/// Database the server always has, used to create or drop others.
const MAINTENANCE_DB: &str = "postgres";

/// Connection settings for the lesson plan database.
///
/// The URL comes from `LESSONPLAN_DATABASE_URL` when built with
/// [`Self::from_env`], else `postgresql://localhost:5432/lessonplan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long to wait for a pooled connection before failing.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/lessonplan";

    pub const ENV_VAR: &str = "LESSONPLAN_DATABASE_URL";

    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    pub fn from_env() -> Self {
        Self::new(env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned()))
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Split the URL into `(server, database, query)`, where `query`
    /// includes its leading `?`. `database` is empty when the URL has none.
    fn parts(&self) -> (&str, &str, &str) {
        let (base, query) = match self.database_url.find('?') {
            Some(pos) => self.database_url.split_at(pos),
            None => (self.database_url.as_str(), ""),
        };
        match base.rsplit_once('/') {
            // `postgresql://host` only splits on the scheme's slashes.
            Some((server, name)) if !server.ends_with('/') => (server, name, query),
            _ => (base, "", query),
        }
    }

    /// Database name from the URL path, ignoring query parameters.
    pub fn database_name(&self) -> Option<&str> {
        let (_, name, _) = self.parts();
        (!name.is_empty()).then_some(name)
    }

    /// Database name, checked to be safe to splice into `CREATE DATABASE`
    /// and `DROP DATABASE`, which cannot take bind parameters.
    pub fn validated_database_name(&self) -> Result<&str> {
        let Some(name) = self.database_name() else {
            bail!("database URL {} names no database", self.database_url);
        };
        let valid_start = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("database name {name:?} must be an unquoted SQL identifier");
        }
        Ok(name)
    }

    /// Same server, credentials, query parameters and pool settings, but
    /// pointing at database `name`.
    pub fn with_database(&self, name: &str) -> Self {
        let (server, _, query) = self.parts();
        Self {
            database_url: format!("{server}/{name}{query}"),
            ..self.clone()
        }
    }

    /// Config for the `postgres` maintenance database on the same server.
    pub fn maintenance(&self) -> Self {
        self.with_database(MAINTENANCE_DB)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
