//! Service configuration
//!
//! Loaded from a YAML file merged with `SYNCSRV_`-prefixed environment
//! variables; `__` separates nesting levels in variable names, leaving
//! single underscores free for the snake_case field names themselves
//! (`SYNCSRV_SOURCE__DB_PATH` overrides `source.db_path`). Table and
//! column names end up inside SQL statements, so validation rejects
//! anything that is not a plain identifier.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::tags::{TagDictionary, TagEntry};

pub const DEFAULT_CONFIG_PATH: &str = "config/syncsrv.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Seconds between sync cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Bind address for the control API
    #[serde(default = "default_api_bind")]
    pub api_bind: String,
    /// Start the sync loop at boot instead of waiting for the control API
    #[serde(default)]
    pub autostart: bool,
    /// Log level for this service's own targets
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for file logs; unset keeps console-only logging
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Write file logs as JSON
    #[serde(default)]
    pub log_json: bool,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_api_bind() -> String {
    "0.0.0.0:8094".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            api_bind: default_api_bind(),
            autostart: false,
            log_level: default_log_level(),
            log_dir: None,
            log_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// SQLite file holding the narrow readings table
    pub db_path: String,
    #[serde(default = "default_source_table")]
    pub table: String,
    /// Upper bound on readings fetched per chunk
    #[serde(default = "default_fetch_chunk_size")]
    pub fetch_chunk_size: usize,
}

fn default_source_table() -> String {
    "readings".to_string()
}

fn default_fetch_chunk_size() -> usize {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// SQLite file receiving the wide table
    pub db_path: String,
    #[serde(default = "default_destination_table")]
    pub table: String,
}

fn default_destination_table() -> String {
    "readings_wide".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    /// Tag dictionary entries; tags not listed here are dropped on sync
    pub tags: Vec<TagEntry>,
}

impl Config {
    /// Load configuration from the YAML file merged with environment
    /// overrides, then validate it.
    pub fn load(path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SYNCSRV_").split("__"))
            .extract()
            .map_err(|e| SyncError::Configuration(format!("failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn dictionary(&self) -> TagDictionary {
        TagDictionary::new(&self.tags)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.poll_interval_secs == 0 {
            return Err(config_err("poll_interval_secs must be at least 1"));
        }
        if self.service.api_bind.parse::<SocketAddr>().is_err() {
            return Err(config_err(format!(
                "api_bind '{}' is not a valid socket address",
                self.service.api_bind
            )));
        }
        let level = self.service.log_level.to_ascii_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return Err(config_err(format!(
                "log_level '{}' is not one of trace/debug/info/warn/error",
                self.service.log_level
            )));
        }
        if self.source.db_path.is_empty() {
            return Err(config_err("source.db_path must not be empty"));
        }
        if self.destination.db_path.is_empty() {
            return Err(config_err("destination.db_path must not be empty"));
        }
        if self.source.fetch_chunk_size == 0 {
            return Err(config_err("fetch_chunk_size must be at least 1"));
        }
        if !is_valid_identifier(&self.source.table) {
            return Err(config_err(format!(
                "source table '{}' is not a valid identifier",
                self.source.table
            )));
        }
        if !is_valid_identifier(&self.destination.table) {
            return Err(config_err(format!(
                "destination table '{}' is not a valid identifier",
                self.destination.table
            )));
        }
        if self.source.db_path == self.destination.db_path
            && self.source.table.eq_ignore_ascii_case(&self.destination.table)
        {
            return Err(config_err(
                "source and destination must not point at the same table",
            ));
        }

        if self.tags.is_empty() {
            return Err(config_err("at least one tag mapping must be configured"));
        }
        let mut indexes = HashSet::new();
        let mut columns = HashSet::new();
        for entry in &self.tags {
            if !is_valid_identifier(&entry.column) {
                return Err(config_err(format!(
                    "tag column '{}' is not a valid identifier",
                    entry.column
                )));
            }
            // SQLite identifiers are case-insensitive
            if entry.column.eq_ignore_ascii_case("ts") {
                return Err(config_err(
                    "tag column 'ts' collides with the timestamp key column",
                ));
            }
            if !indexes.insert(entry.index) {
                return Err(config_err(format!("duplicate tag index {}", entry.index)));
            }
            if !columns.insert(entry.column.to_ascii_lowercase()) {
                return Err(config_err(format!("duplicate tag column '{}'", entry.column)));
            }
        }

        Ok(())
    }
}

fn config_err(message: impl Into<String>) -> SyncError {
    SyncError::Configuration(message.into())
}

/// A bare SQL identifier: letters, digits and underscores, not starting
/// with a digit. Everything else is rejected rather than escaped.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            source: SourceConfig {
                db_path: "/data/source.db".to_string(),
                table: default_source_table(),
                fetch_chunk_size: default_fetch_chunk_size(),
            },
            destination: DestinationConfig {
                db_path: "/data/dest.db".to_string(),
                table: default_destination_table(),
            },
            tags: vec![
                TagEntry {
                    index: 1,
                    column: "temp_supply".to_string(),
                },
                TagEntry {
                    index: 2,
                    column: "temp_return".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(create_test_config().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = create_test_config();
        config.service.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = create_test_config();
        config.source.fetch_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bind_address_rejected() {
        let mut config = create_test_config();
        config.service.api_bind = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut config = create_test_config();
        config.service.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_tags_rejected() {
        let mut config = create_test_config();
        config.tags.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_tag_index_rejected() {
        let mut config = create_test_config();
        config.tags[1].index = config.tags[0].index;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_column_rejected_case_insensitive() {
        let mut config = create_test_config();
        config.tags[1].column = "TEMP_SUPPLY".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        for bad in ["1bad", "bad-name", "bad name", "drop;table", ""] {
            let mut config = create_test_config();
            config.tags[0].column = bad.to_string();
            assert!(config.validate().is_err(), "accepted {bad:?}");

            let mut config = create_test_config();
            config.source.table = bad.to_string();
            assert!(config.validate().is_err(), "accepted table {bad:?}");
        }
    }

    #[test]
    fn test_ts_column_collision_rejected() {
        let mut config = create_test_config();
        config.tags[0].column = "TS".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_table_both_sides_rejected() {
        let mut config = create_test_config();
        config.destination.db_path = config.source.db_path.clone();
        config.destination.table = config.source.table.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_database_different_tables_allowed() {
        let mut config = create_test_config();
        config.destination.db_path = config.source.db_path.clone();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_applies_defaults() {
        let yaml = r#"
source:
  db_path: /data/plant.db
destination:
  db_path: /data/wide.db
tags:
  - index: 1
    column: temp_supply
"#;
        let config: Config = Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.service.poll_interval_secs, 60);
        assert_eq!(config.service.api_bind, "0.0.0.0:8094");
        assert!(!config.service.autostart);
        assert_eq!(config.source.table, "readings");
        assert_eq!(config.source.fetch_chunk_size, 5000);
        assert_eq!(config.destination.table, "readings_wide");
        assert_eq!(config.dictionary().columns(), &["temp_supply"]);
    }

    #[test]
    fn test_env_overrides_reach_nested_snake_case_fields() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "syncsrv.yaml",
                r#"
source:
  db_path: /data/plant.db
destination:
  db_path: /data/wide.db
tags:
  - index: 1
    column: temp_supply
"#,
            )?;
            jail.set_env("SYNCSRV_SOURCE__DB_PATH", "/data/override.db");
            jail.set_env("SYNCSRV_SERVICE__POLL_INTERVAL_SECS", "30");

            let config = Config::load("syncsrv.yaml").expect("config should load");
            assert_eq!(config.source.db_path, "/data/override.db");
            assert_eq!(config.service.poll_interval_secs, 30);
            // Untouched fields keep their YAML values
            assert_eq!(config.destination.db_path, "/data/wide.db");
            Ok(())
        });
    }
}
