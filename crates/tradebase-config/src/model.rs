use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tradebase_common::{Error, LengthPolicy, Result, is_valid_identifier};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Reject values that would only fail later, halfway through a run.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(Error::Config("database.path cannot be empty".into()));
        }
        if !is_valid_identifier(&self.migrations.table) {
            return Err(Error::Config(format!(
                "migrations.table is not a valid table name: {:?}",
                self.migrations.table
            )));
        }
        if self.migrations.table.starts_with("sqlite_") {
            return Err(Error::Config(
                "migrations.table cannot use the reserved sqlite_ prefix".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file. Relative paths resolve against the
    /// working directory.
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tradebase.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Ledger table recording applied migration versions.
    pub table: String,
    pub length_policy: LengthPolicy,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            table: "_migrations".to_string(),
            length_policy: LengthPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, PathBuf::from("tradebase.db"));
        assert_eq!(config.migrations.table, "_migrations");
        assert_eq!(config.migrations.length_policy, LengthPolicy::Reject);
        assert_eq!(config.log.format, LogFormat::Pretty);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_ledger_table_names() {
        let mut config = AppConfig::default();
        config.migrations.table = "schema migrations".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.migrations.table = "sqlite_ledger".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_empty_database_path() {
        let mut config = AppConfig::default();
        config.database.path = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
