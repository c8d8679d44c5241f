//! # Configuration
//!
//! Environment-aware configuration for the scheduling core. Values come from
//! an optional YAML file (path in `ORCHESTRA_CONFIG`, falling back to
//! `config/orchestra.yaml`), overlaid with a small set of environment
//! variables, with serde defaults for everything omitted.

use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level configuration for server, sweeper and client components
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestraConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub sweeper: SweeperConfig,
    pub client: ClientConfig,
}

/// Postgres connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string, overridable via `DATABASE_URL`
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/orchestra_development".to_string(),
            max_connections: 10,
            connect_timeout_ms: 5_000,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, overridable via `ORCHESTRA_BIND_ADDRESS`
    pub bind_address: String,
    /// Outer request timeout; must exceed the long-poll ceiling
    pub request_timeout_ms: u64,
    /// How long a long-polling dequeue holds the connection open
    pub long_poll_ceiling_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3008".to_string(),
            request_timeout_ms: 30_000,
            long_poll_ceiling_ms: 10_000,
        }
    }
}

/// Expiry sweeper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    pub tick_interval_ms: u64,
    /// Upper bound on tasks expired per tick
    pub batch_size: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: 500,
            batch_size: 1_000,
        }
    }
}

/// Defaults for the orchestrator client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL, overridable via `ORCHESTRA_SERVER_URL`
    pub base_url: String,
    /// Per-request timeout; must exceed the server's long-poll ceiling
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    /// Interval between output polls inside `execute`
    pub output_poll_interval_ms: u64,
    /// Default overall deadline for `execute` when the caller passes none
    pub fetch_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3008".to_string(),
            request_timeout_ms: 60_000,
            max_retries: 3,
            output_poll_interval_ms: 500,
            fetch_timeout_ms: 120_000,
        }
    }
}

impl OrchestraConfig {
    /// Load configuration: YAML file if present, then environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("ORCHESTRA_CONFIG")
            .unwrap_or_else(|_| "config/orchestra.yaml".to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_yaml_file(Path::new(&path))?
        } else {
            debug!(path = %path, "no configuration file found, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|e| {
            SchedulerError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Overlay environment variables onto the loaded values
    ///
    /// Takes a lookup closure so tests can exercise the override logic
    /// without mutating process-global state.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(addr) = get("ORCHESTRA_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Some(url) = get("ORCHESTRA_SERVER_URL") {
            self.client.base_url = url;
        }
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(SchedulerError::Configuration(
                "database.max_connections must be positive".to_string(),
            ));
        }
        if self.sweeper.tick_interval_ms == 0 {
            return Err(SchedulerError::Configuration(
                "sweeper.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.server.long_poll_ceiling_ms >= self.server.request_timeout_ms {
            return Err(SchedulerError::Configuration(
                "server.long_poll_ceiling_ms must be below server.request_timeout_ms".to_string(),
            ));
        }
        if self.server.long_poll_ceiling_ms >= self.client.request_timeout_ms {
            return Err(SchedulerError::Configuration(
                "server.long_poll_ceiling_ms must be below client.request_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestraConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweeper.tick_interval_ms, 500);
        assert_eq!(config.server.long_poll_ceiling_ms, 10_000);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  bind_address: \"127.0.0.1:4000\"\nsweeper:\n  tick_interval_ms: 250\n"
        )
        .unwrap();

        let config = OrchestraConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:4000");
        assert_eq!(config.sweeper.tick_interval_ms, 250);
        // untouched sections keep defaults
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.client.max_retries, 3);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "server: [not, a, map]").unwrap();
        assert!(OrchestraConfig::from_yaml_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut vars = HashMap::new();
        vars.insert("DATABASE_URL", "postgresql://db.internal/orchestra");
        vars.insert("ORCHESTRA_SERVER_URL", "http://orchestrator.internal:3008");

        let mut config = OrchestraConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url, "postgresql://db.internal/orchestra");
        assert_eq!(config.client.base_url, "http://orchestrator.internal:3008");
        // no override requested, default retained
        assert_eq!(config.server.bind_address, "0.0.0.0:3008");
    }

    #[test]
    fn test_validation_rejects_poll_ceiling_above_timeouts() {
        let mut config = OrchestraConfig::default();
        config.server.long_poll_ceiling_ms = config.server.request_timeout_ms;
        assert!(config.validate().is_err());
    }
}
