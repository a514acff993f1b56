//! Configuration loading and validation.

mod connection;
mod types;
mod validation;

pub use connection::{ConnectionDescriptor, DialectKind};
pub use types::*;
pub use validation::validate_sync_options;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Replace either side with a descriptor parsed from a connection string.
    ///
    /// A connection string wins outright over the config file section.
    pub fn with_overrides(mut self, source: Option<&str>, target: Option<&str>) -> Result<Self> {
        if let Some(s) = source {
            self.source_db = s.parse()?;
        }
        if let Some(t) = target {
            self.target_db = t.parse()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
source_db:
  type: sqlite
  path: source.db
target_db:
  type: mysql
  host: localhost
  user: app
  password: secret
  database: app
sync_options:
  tables: [users, orders]
  truncate_target: true
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.target_db.dialect, DialectKind::Mysql);
        assert_eq!(config.target_db.port(), 3306);
        assert_eq!(config.sync_options.tables, vec!["users", "orders"]);
        assert!(config.sync_options.truncate_target);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = YAML.replace("host: localhost", "host: \"\"");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_sample_round_trips_through_yaml() {
        let yaml = Config::sample().to_yaml().unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.source_db.path, "source.db");
        assert_eq!(config.sync_options, SyncOptions::default());
    }

    #[test]
    fn test_override_replaces_whole_descriptor() {
        let config = Config::from_yaml(YAML)
            .unwrap()
            .with_overrides(None, Some("postgresql://other@db.example.com/warehouse"))
            .unwrap();
        assert_eq!(config.target_db.dialect, DialectKind::Postgresql);
        assert_eq!(config.target_db.host, "db.example.com");
        assert!(config.target_db.password.is_empty());
        assert_eq!(config.source_db.path, "source.db");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/syncdb.yaml").is_err());
    }
}
