//! Configuration validation.

use super::{Config, ConnectionDescriptor, DialectKind, SyncOptions};
use crate::core::identifier::validate_identifier;
use crate::drivers::common::tls::SSL_MODES;
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_descriptor("source_db", &config.source_db)?;
    validate_descriptor("target_db", &config.target_db)?;

    // Cannot sync a database onto itself
    if config.source_db.same_database(&config.target_db) {
        return Err(SyncError::Config(
            "source_db and target_db cannot be the same database".into(),
        ));
    }

    validate_sync_options(&config.sync_options)?;

    match config.logging.format.to_lowercase().as_str() {
        "text" | "json" => {}
        other => {
            return Err(SyncError::Config(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                other
            )))
        }
    }

    Ok(())
}

/// Check the sync options alone. Also run by [`crate::sync_all`].
pub fn validate_sync_options(opts: &SyncOptions) -> Result<()> {
    if opts.schema_only && opts.data_only {
        return Err(SyncError::Config(
            "sync_options.schema_only and sync_options.data_only are mutually exclusive".into(),
        ));
    }
    if opts.batch_size == 0 {
        return Err(SyncError::Config(
            "sync_options.batch_size must be at least 1".into(),
        ));
    }
    if opts.workers == 0 {
        return Err(SyncError::Config(
            "sync_options.workers must be at least 1".into(),
        ));
    }
    if opts.timeout_secs == 0 {
        return Err(SyncError::Config(
            "sync_options.timeout_secs must be at least 1".into(),
        ));
    }
    for table in &opts.tables {
        validate_identifier(table)?;
    }

    Ok(())
}

fn validate_descriptor(section: &str, desc: &ConnectionDescriptor) -> Result<()> {
    match desc.dialect {
        DialectKind::Sqlite => {
            if desc.path.is_empty() {
                return Err(SyncError::Config(format!("{}.path is required", section)));
            }
        }
        DialectKind::Mysql | DialectKind::Postgresql => {
            if desc.host.is_empty() {
                return Err(SyncError::Config(format!("{}.host is required", section)));
            }
            if desc.database.is_empty() {
                return Err(SyncError::Config(format!(
                    "{}.database is required",
                    section
                )));
            }
            if desc.port == Some(0) {
                return Err(SyncError::Config(format!(
                    "{}.port must be between 1 and 65535",
                    section
                )));
            }
            if !SSL_MODES.contains(&desc.ssl_mode.trim().to_lowercase().as_str()) {
                return Err(SyncError::Config(format!(
                    "{}.ssl_mode must be one of {}, got '{}'",
                    section,
                    SSL_MODES.join(", "),
                    desc.ssl_mode
                )));
            }
        }
    }
    Ok(())
}
