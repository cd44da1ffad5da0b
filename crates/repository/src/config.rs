//! Repository configuration.
//!
//! Configuration is plain serde data with defaults for every field, so an
//! empty JSON object is a valid configuration:
//!
//! ```
//! use helios_repository::config::RepositoryConfig;
//!
//! let config = RepositoryConfig::from_json_str(r#"{ "sqlite": { "max_connections": 4 } }"#).unwrap();
//! assert_eq!(config.persistence_unit, "default-persistence-unit");
//! assert_eq!(config.sqlite.max_connections, 4);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[cfg(feature = "sqlite")]
use crate::backends::sqlite::SqliteBackendConfig;

/// Persistence unit used when none is configured.
pub const DEFAULT_PERSISTENCE_UNIT: &str = "default-persistence-unit";

fn default_persistence_unit() -> String {
    DEFAULT_PERSISTENCE_UNIT.to_string()
}

/// Top-level repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Name of the persistence unit repositories open by default.
    #[serde(default = "default_persistence_unit")]
    pub persistence_unit: String,

    /// SQLite backend settings.
    #[cfg(feature = "sqlite")]
    #[serde(default)]
    pub sqlite: SqliteBackendConfig,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            persistence_unit: default_persistence_unit(),
            #[cfg(feature = "sqlite")]
            sqlite: SqliteBackendConfig::default(),
        }
    }
}

impl RepositoryConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RepositoryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Loaded repository configuration");
        Self::from_json_str(&text)
    }

    /// Checks values serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence_unit.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "persistence_unit".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        #[cfg(feature = "sqlite")]
        {
            self.sqlite.identifier_regex()?;
            if self.sqlite.max_connections == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "sqlite.max_connections".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            if self.sqlite.min_connections > self.sqlite.max_connections {
                return Err(ConfigError::InvalidValue {
                    field: "sqlite.min_connections".to_string(),
                    message: format!(
                        "{} exceeds max_connections ({})",
                        self.sqlite.min_connections, self.sqlite.max_connections
                    ),
                });
            }
        }

        Ok(())
    }
}
