use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::NamePulseError;
use crate::retention::DEFAULT_RETENTION_DAYS;
use crate::store::StoreConfig;

const CONFIG_FILENAME: &str = "config.toml";
const DB_FILENAME: &str = "namepulse.db";
const ENV_PREFIX: &str = "NAMEPULSE_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub namepulse: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const NAMEPULSE_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            namepulse: Self::NAMEPULSE_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.namepulse.clone();
        self.namepulse = self.namepulse.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.namepulse.as_str()) {
            eprintln!(
                "Config error: namepulse log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::NAMEPULSE_LEVEL
            );
            self.namepulse = Self::NAMEPULSE_LEVEL.to_owned();
        }
    }

    /// Logger spec string for flexi_logger, e.g. `namepulse=info`
    pub fn log_spec(&self) -> String {
        format!("namepulse={}", self.namepulse)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub enabled: bool,
    /// Database file. Defaults to the data directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub retention_days: i64,
}

impl DatabaseConfig {
    const MAX_RETENTION_DAYS: i64 = 36_500;

    fn default() -> Self {
        DatabaseConfig {
            enabled: true,
            path: None,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    fn ensure_valid(&mut self) {
        if !(1..=Self::MAX_RETENTION_DAYS).contains(&self.retention_days) {
            eprintln!(
                "Config error: retention_days of '{}' is invalid - using default of '{}'",
                self.retention_days, DEFAULT_RETENTION_DAYS
            );
            self.retention_days = DEFAULT_RETENTION_DAYS;
        }

        if let Some(path) = &self.path {
            if path.trim().is_empty() {
                self.path = None;
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
}

impl Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
        }
    }

    /// Loads the configuration from a TOML file located in the app's data directory.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join(CONFIG_FILENAME);
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Self {
        let default_config = Config::default();

        // If the config file doesn't exist, write the default configuration to disk.
        if !config_path.exists() {
            Self::write_default(config_path, &default_config);
        }

        // Attempt to extract the configuration; on error, report and fall back to defaults.
        // The logger is not running yet, so errors go to stderr.
        let mut config = Self::extract(config_path).unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    /// Defaults, merged with the TOML file (if it exists), merged with
    /// `NAMEPULSE_`-prefixed environment variables (`__` separates sections).
    pub fn extract(config_path: &Path) -> Result<Self, NamePulseError> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| NamePulseError::ConfigError(Box::new(e)))
    }

    fn write_default(config_path: &Path, default_config: &Config) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
            }
        }
        match toml::to_string_pretty(default_config) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(_) => eprintln!("Failed to serialize default config."),
        }
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.database.ensure_valid();
    }

    /// The store settings, with the database placed in `data_dir` unless a
    /// path is configured.
    pub fn store_config(&self, data_dir: &Path) -> StoreConfig {
        let path = match &self.database.path {
            Some(path) => PathBuf::from(path),
            None => data_dir.join(DB_FILENAME),
        };

        StoreConfig {
            enabled: self.database.enabled,
            path,
            retention_days: self.database.retention_days,
        }
    }
}
