//! Configuration management for dbup.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. `DBUP_CONFIG` environment variable (explicit path)
//! 2. `./dbup.toml` in the working directory
//! 3. OS config directory (`dbup/config.toml`)
//! 4. Default values

use anyhow::{Context, Result};
use dbup_core::{ConnectionInfo, DatabaseKind, UpdateOptions, UpdaterSettings};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External SQL client settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Update/migration policy
    #[serde(default)]
    pub updates: UpdatesConfig,

    /// Source tree location
    #[serde(default)]
    pub source: SourceConfig,

    /// Per-database connection settings
    #[serde(default)]
    pub databases: DatabasesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path to the SQL client binary; a bare name is resolved via PATH.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// Re-apply ordinary migrations whose content changed
    #[serde(default = "default_true")]
    pub redundancy: bool,

    /// Refresh missing archived fingerprints without re-applying
    #[serde(default = "default_true")]
    pub allow_rehash: bool,

    /// Re-apply archived migrations whose content changed
    #[serde(default)]
    pub archived_redundancy: bool,

    /// Dead bookkeeping rows tolerated before the run fails (negative: unlimited)
    #[serde(default = "default_dead_ref_max")]
    pub clean_dead_ref_max_count: i64,

    /// Download base snapshots without prompting
    #[serde(default)]
    pub auto_db_update: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root of the tree containing `sql/base`, `sql/updates` and `sql/old`.
    #[serde(default = "default_source_dir")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabasesConfig {
    #[serde(default)]
    pub auth: DatabaseConfig,
    #[serde(default)]
    pub world: DatabaseConfig,
    #[serde(default)]
    pub characters: DatabaseConfig,
    #[serde(default)]
    pub hotfixes: DatabaseConfig,
}

/// Connection and policy settings for one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    /// Numeric TCP port or a socket path
    #[serde(default = "default_port")]
    pub port_or_socket: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Schema name; defaults to the database kind's key (auth, world, ...)
    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub tls: bool,

    /// Base snapshot URL for download-provisioned kinds
    #[serde(default)]
    pub base_url: Option<String>,
}

// Default value functions

fn default_executable() -> PathBuf {
    PathBuf::from("mysql")
}

fn default_true() -> bool {
    true
}

fn default_dead_ref_max() -> i64 {
    3
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> String {
    "3306".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
        }
    }
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            redundancy: true,
            allow_rehash: true,
            archived_redundancy: false,
            clean_dead_ref_max_count: default_dead_ref_max(),
            auto_db_update: false,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: default_source_dir(),
        }
    }
}

impl Default for DatabasesConfig {
    fn default() -> Self {
        Self {
            auth: DatabaseConfig::default(),
            world: DatabaseConfig::default(),
            characters: DatabaseConfig::default(),
            hotfixes: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port_or_socket: default_port(),
            user: default_user(),
            password: String::new(),
            database: String::new(),
            tls: false,
            base_url: None,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DBUP_CONFIG") {
            return PathBuf::from(path);
        }

        let local = PathBuf::from("dbup.toml");
        if local.exists() {
            return local;
        }

        if let Some(proj_dirs) = ProjectDirs::from("dev", "dbup", "dbup") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dbup")
                .join("config.toml")
        }
    }

    /// Per-database settings for a kind.
    pub fn database(&self, kind: DatabaseKind) -> &DatabaseConfig {
        match kind {
            DatabaseKind::Auth => &self.databases.auth,
            DatabaseKind::World => &self.databases.world,
            DatabaseKind::Characters => &self.databases.characters,
            DatabaseKind::Hotfixes => &self.databases.hotfixes,
        }
    }

    /// Bitmask of enabled database kinds.
    pub fn enabled_mask(&self) -> u32 {
        DatabaseKind::ALL
            .into_iter()
            .filter(|kind| self.database(*kind).enabled)
            .map(|kind| kind.profile().flag)
            .sum()
    }

    /// Connection attributes for a kind's pool.
    pub fn connection_info(&self, kind: DatabaseKind) -> ConnectionInfo {
        let db = self.database(kind);
        let database = if db.database.is_empty() {
            kind.profile().config_key.to_string()
        } else {
            db.database.clone()
        };
        ConnectionInfo {
            host: db.host.clone(),
            user: db.user.clone(),
            password: db.password.clone(),
            port_or_socket: db.port_or_socket.clone(),
            database,
            tls: db.tls,
        }
    }

    /// Fetcher policy knobs from the `[updates]` section.
    pub fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            redundancy: self.updates.redundancy,
            allow_rehash: self.updates.allow_rehash,
            archived_redundancy: self.updates.archived_redundancy,
            clean_dead_ref_max_count: self.updates.clean_dead_ref_max_count,
        }
    }

    /// Full updater settings for one kind.
    pub fn updater_settings(&self, kind: DatabaseKind) -> UpdaterSettings {
        UpdaterSettings {
            source_dir: self.source.directory.clone(),
            options: self.update_options(),
            auto_db_update: self.updates.auto_db_update,
            base_url: self.database(kind).base_url.clone(),
        }
    }
}
