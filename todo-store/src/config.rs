//! Store configuration
//!
//! Loaded from the environment (with `.env` support) or from a TOML file with
//! a `[database]` table:
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/todos"
//! max_connections = 5
//! acquire_timeout_secs = 10
//! run_migrations = true
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default maximum connections for the pool.
/// Kept low; the handler layer shares one pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/todos";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    database: StoreConfig,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_secs() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_SECS
}

fn default_run_migrations() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            run_migrations: true,
        }
    }
}

impl StoreConfig {
    /// Build config from environment variables, reading `.env` first if present.
    ///
    /// - `DATABASE_URL` (required)
    /// - `TODO_STORE_MAX_CONNECTIONS`
    /// - `TODO_STORE_ACQUIRE_TIMEOUT_SECS`
    /// - `TODO_STORE_RUN_MIGRATIONS` (`true`/`false`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StoreError::config("undefined [DATABASE_URL]"))?;

        let mut config = Self {
            database_url,
            ..Self::default()
        };

        if let Some(v) = lookup("TODO_STORE_MAX_CONNECTIONS") {
            config.max_connections = parse_var("TODO_STORE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("TODO_STORE_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout_secs = parse_var("TODO_STORE_ACQUIRE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("TODO_STORE_RUN_MIGRATIONS") {
            config.run_migrations = parse_var("TODO_STORE_RUN_MIGRATIONS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse the `[database]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| StoreError::config(format!("invalid TOML: {}", e)))?;
        file.database.validate()?;
        Ok(file.database)
    }

    /// Load config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::config(format!("failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(StoreError::config("max_connections must be at least 1"));
        }
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(StoreError::config(format!(
                "database url must use postgres:// scheme, got '{}'",
                self.database_url
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StoreError::config(format!("invalid value for {}: '{}'", key, value)))
}
