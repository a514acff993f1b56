//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use super::connection::ConnectionDescriptor;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database rows are read from.
    pub source_db: ConnectionDescriptor,

    /// Database rows are written to.
    pub target_db: ConnectionDescriptor,

    /// Sync behavior.
    #[serde(default)]
    pub sync_options: SyncOptions,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// The document written by `syncdb init`.
    pub fn sample() -> Self {
        Self {
            source_db: ConnectionDescriptor::sqlite("source.db"),
            target_db: ConnectionDescriptor::sqlite("target.db"),
            sync_options: SyncOptions::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Build a config from connection descriptors alone, with default options.
    pub fn from_descriptors(source: ConnectionDescriptor, target: ConnectionDescriptor) -> Self {
        Self {
            source_db: source,
            target_db: target,
            sync_options: SyncOptions::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// What to sync and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Tables to sync. Empty means every source table.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Remove all target rows before copying.
    #[serde(default)]
    pub truncate_target: bool,

    /// Create missing tables only.
    #[serde(default)]
    pub schema_only: bool,

    /// Copy rows only; never issue DDL.
    #[serde(default)]
    pub data_only: bool,

    /// Rows per read batch and per INSERT.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Tables processed concurrently during the data phase.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds before a batch read, batch write or pool acquire gives up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            truncate_target: false,
            schema_only: false,
            data_only: false,
            batch_size: default_batch_size(),
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SyncOptions {
    /// Whether the schema phase runs.
    pub fn runs_schema_phase(&self) -> bool {
        !self.data_only
    }

    /// Whether the data phase runs.
    pub fn runs_data_phase(&self) -> bool {
        !self.schema_only
    }

    /// Parse a comma-separated table list, dropping blanks and duplicates.
    pub fn parse_table_list(list: &str) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !tables.iter().any(|t| t == name) {
                tables.push(name.to_string());
            }
        }
        tables
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: ERROR, WARN, INFO, DEBUG or TRACE.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions for serde
fn default_batch_size() -> usize {
    1000
}

fn default_workers() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DialectKind;

    #[test]
    fn test_sample_is_sqlite_to_sqlite() {
        let config = Config::sample();
        assert_eq!(config.source_db.dialect, DialectKind::Sqlite);
        assert_eq!(config.source_db.path, "source.db");
        assert_eq!(config.target_db.path, "target.db");
        assert_eq!(config.sync_options.batch_size, 1000);
        assert_eq!(config.logging.level, "INFO");
    }

    #[test]
    fn test_sync_options_defaults_from_partial_yaml() {
        let opts: SyncOptions = serde_yaml::from_str("truncate_target: true\n").unwrap();
        assert!(opts.truncate_target);
        assert!(opts.tables.is_empty());
        assert_eq!(opts.workers, 1);
        assert_eq!(opts.timeout_secs, 30);
        assert!(opts.runs_schema_phase());
        assert!(opts.runs_data_phase());
    }

    #[test]
    fn test_phase_flags() {
        let opts = SyncOptions {
            schema_only: true,
            ..Default::default()
        };
        assert!(opts.runs_schema_phase());
        assert!(!opts.runs_data_phase());
    }

    #[test]
    fn test_parse_table_list() {
        assert_eq!(
            SyncOptions::parse_table_list(" users, orders,,users "),
            vec!["users".to_string(), "orders".to_string()]
        );
        assert!(SyncOptions::parse_table_list("").is_empty());
    }
}
