//! TOML-based configuration.
//!
//! The file names where the document store lives, how verbose logging is
//! and which sync handlers are active. `EDULMS_DATA_DIR` overrides the
//! store directory at runtime via [`AppConfig::apply_env_overrides`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dispatch::Handler;
use crate::errors::ConfigError;

/// Environment variable overriding `store.data_dir`.
pub const DATA_DIR_ENV: &str = "EDULMS_DATA_DIR";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sync handler settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Where the SQLite document store is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for persistent data.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`.
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/edulms-sync")
}
fn default_db_file() -> String {
    "edulms.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
        }
    }
}

impl StoreConfig {
    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level or an `EnvFilter` directive string.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync behaviour
// ---------------------------------------------------------------------------

/// Which handlers run and where their error reports go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Handlers bound in the hook table. Defaults to all of them.
    #[serde(default = "default_handlers")]
    pub enabled_handlers: Vec<Handler>,

    /// Keep error reports in the database `error_log` table.
    #[serde(default = "default_true")]
    pub persist_error_reports: bool,
}

fn default_handlers() -> Vec<Handler> {
    Handler::ALL.to_vec()
}
fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled_handlers: default_handlers(),
            persist_error_reports: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                debug!(env = DATA_DIR_ENV, dir = %dir, "overriding store.data_dir");
                self.store.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.data_dir".into(),
                detail: "data directory must not be empty".into(),
            });
        }
        if self.store.db_file.is_empty() || self.store.db_file.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "store.db_file".into(),
                detail: "must be a plain file name".into(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: "log level must not be empty".into(),
            });
        }
        let mut seen = Vec::new();
        for handler in &self.sync.enabled_handlers {
            if seen.contains(handler) {
                return Err(ConfigError::InvalidValue {
                    field: "sync.enabled_handlers".into(),
                    detail: format!("handler '{}' listed twice", handler.as_str()),
                });
            }
            seen.push(*handler);
        }

        Ok(())
    }

    /// Convenience: load, apply overrides, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[store]
data_dir = "/tmp/edulms"
db_file = "sync.db"

[logging]
level = "debug"

[sync]
enabled_handlers = ["enrollment_created", "enrollment_deleted", "lms_course_deleted"]
persist_error_reports = false
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.store.db_path(), PathBuf::from("/tmp/edulms/sync.db"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.sync.enabled_handlers,
            vec![
                Handler::EnrollmentCreated,
                Handler::EnrollmentDeleted,
                Handler::LmsCourseDeleted
            ]
        );
        assert!(!config.sync.persist_error_reports);
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.store.data_dir, PathBuf::from("/var/lib/edulms-sync"));
        assert_eq!(config.store.db_file, "edulms.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sync.enabled_handlers.len(), Handler::ALL.len());
        assert!(config.sync.persist_error_reports);
    }

    #[test]
    fn test_unknown_handler_is_parse_error() {
        let result: Result<AppConfig, _> =
            toml::from_str("[sync]\nenabled_handlers = [\"grade_synced\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.store.db_file, "sync.db");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_nested_db_file() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.store.db_file = "sub/sync.db".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "store.db_file"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_handler() {
        let mut config = AppConfig::default();
        config.sync.enabled_handlers = vec![Handler::EnrollmentCreated, Handler::EnrollmentCreated];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "sync.enabled_handlers"
        ));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var(DATA_DIR_ENV, "/srv/edulms");
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.apply_env_overrides();
        assert_eq!(config.store.data_dir, PathBuf::from("/srv/edulms"));

        // Clean up
        std::env::remove_var(DATA_DIR_ENV);
    }
}
