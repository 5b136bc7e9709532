//! Storage configuration.
//!
//! Reads configuration from environment variables:
//! - `FGDB_DB_PATH`: SQLite database file path (default: "fgdb.db")
//! - `FGDB_DATABASE`: name of the database inside that file (default: "default")

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: "fgdb.db".to_string(),
            database: "default".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = StorageConfig::default();
        StorageConfig {
            db_path: lookup("FGDB_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.db_path),
            database: lookup("FGDB_DATABASE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.database),
        }
    }
}
