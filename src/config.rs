use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::adapter::{Engine, Scope};
use crate::graph::Table;
use crate::respawner::RespawnerOptions;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RespawnConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub scope: ScopeConfig,
    pub reset: ResetConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub adapter: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScopeConfig {
    pub schemas_to_include: Vec<String>,
    pub schemas_to_exclude: Vec<String>,
    /// `schema.table` or bare `table` names.
    pub tables_to_ignore: Vec<String>,
    pub tables_to_include: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ResetConfig {
    pub with_reseed: bool,
    pub check_temporal_tables: bool,
    pub command_timeout_secs: Option<u64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "test.db".into(),
            adapter: Engine::Sqlite.as_str().into(),
        }
    }
}

/// Returns `~/.respawn/`, or `.respawn/` when there is no home directory.
pub fn default_respawn_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".respawn")
}

/// Returns the default config file path: `~/.respawn/config.toml`
pub fn default_config_path() -> PathBuf {
    default_respawn_dir().join("config.toml")
}

impl RespawnConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RespawnConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (RESPAWN_DB, RESPAWN_ADAPTER, RESPAWN_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RESPAWN_DB") {
            self.database.path = val;
        }
        if let Ok(val) = std::env::var("RESPAWN_ADAPTER") {
            self.database.adapter = val;
        }
        if let Ok(val) = std::env::var("RESPAWN_LOG_LEVEL") {
            self.logging.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.database.path)
    }

    /// Build respawner options, validating adapter and table names.
    pub fn respawner_options(&self) -> Result<RespawnerOptions> {
        let engine: Engine = self
            .database
            .adapter
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(RespawnerOptions {
            scope: Scope {
                schemas_to_include: self.scope.schemas_to_include.clone(),
                schemas_to_exclude: self.scope.schemas_to_exclude.clone(),
                tables_to_ignore: parse_tables(&self.scope.tables_to_ignore)
                    .context("invalid entry in scope.tables_to_ignore")?,
                tables_to_include: parse_tables(&self.scope.tables_to_include)
                    .context("invalid entry in scope.tables_to_include")?,
            },
            with_reseed: self.reset.with_reseed,
            check_temporal_tables: self.reset.check_temporal_tables,
            command_timeout: self.reset.command_timeout_secs.map(Duration::from_secs),
            adapter: engine.adapter(),
        })
    }
}

fn parse_tables(names: &[String]) -> Result<Vec<Table>> {
    names
        .iter()
        .map(|name| name.parse::<Table>().map_err(|e| anyhow::anyhow!(e)))
        .collect()
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RespawnConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.database.adapter, "sqlite");
        assert!(!config.reset.with_reseed);

        let options = config.respawner_options().unwrap();
        assert_eq!(options.adapter.engine(), Engine::Sqlite);
        assert!(options.command_timeout.is_none());
        assert_eq!(options.scope, Scope::default());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[database]
path = "/tmp/app.db"

[scope]
schemas_to_exclude = ["audit"]
tables_to_ignore = ["__migrations", "dbo.Lookup"]

[reset]
with_reseed = true
command_timeout_secs = 30
"#;
        let config: RespawnConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.path, "/tmp/app.db");
        // defaults still apply for unset fields
        assert_eq!(config.database.adapter, "sqlite");
        assert_eq!(config.logging.log_level, "info");

        let options = config.respawner_options().unwrap();
        assert!(options.with_reseed);
        assert!(!options.check_temporal_tables);
        assert_eq!(options.command_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.scope.schemas_to_exclude, vec!["audit".to_string()]);
        assert_eq!(
            options.scope.tables_to_ignore,
            vec![
                Table::unqualified("__migrations"),
                Table::new(Some("dbo"), "Lookup"),
            ]
        );
    }

    #[test]
    fn unknown_adapter_is_rejected() {
        let mut config = RespawnConfig::default();
        config.database.adapter = "oracle".into();

        let err = config.respawner_options().unwrap_err();
        assert!(err.to_string().contains("unknown database adapter"));
    }

    #[test]
    fn bad_table_name_is_rejected() {
        let mut config = RespawnConfig::default();
        config.scope.tables_to_ignore = vec!["dbo.".into()];

        let err = config.respawner_options().unwrap_err();
        assert!(err.to_string().contains("tables_to_ignore"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RespawnConfig::default();
        std::env::set_var("RESPAWN_DB", "/tmp/override.db");
        std::env::set_var("RESPAWN_ADAPTER", "postgres");
        std::env::set_var("RESPAWN_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.database.path, "/tmp/override.db");
        assert_eq!(config.database.adapter, "postgres");
        assert_eq!(config.logging.log_level, "trace");

        // Clean up
        std::env::remove_var("RESPAWN_DB");
        std::env::remove_var("RESPAWN_ADAPTER");
        std::env::remove_var("RESPAWN_LOG_LEVEL");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = RespawnConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.reset.command_timeout_secs, None);
    }
}
