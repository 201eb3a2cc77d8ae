//! Configuration management for roster.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::DEFAULT_ASSIGN_ATTEMPTS;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "roster";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "roster.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "ROSTER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ROSTER_`, sections split by `__`)
/// 2. TOML config file at `~/.config/roster/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Code assignment configuration.
    pub codes: CodeConfig,
    /// Listing configuration.
    pub listing: ListingConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/roster/roster.db`
    pub database_path: Option<PathBuf>,
}

/// Code assignment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Attempts per save when another writer takes the chosen code.
    pub assign_attempts: u32,
    /// Number of proposed codes shown by a backfill dry run.
    pub preview_sample: usize,
}

/// Listing-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Rows shown by `list` when no limit is given.
    /// Set to 0 for unlimited.
    pub default_limit: usize,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            assign_attempts: DEFAULT_ASSIGN_ATTEMPTS,
            preview_sample: 5,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

impl Config {
    /// Load configuration, reading the file at `config_path` or the default
    /// location.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `ROSTER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.codes.assign_attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "codes.assign_attempts must be greater than 0".to_string(),
            });
        }

        if self.codes.preview_sample == 0 {
            return Err(Error::ConfigValidation {
                message: "codes.preview_sample must be greater than 0".to_string(),
            });
        }

        if let Some(path) = &self.storage.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "storage.database_path must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Row limit for listings, `None` when unlimited.
    #[must_use]
    pub fn list_limit(&self) -> Option<usize> {
        match self.listing.default_limit {
            0 => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.codes.assign_attempts, 3);
        assert_eq!(config.codes.preview_sample, 5);
        assert_eq!(config.listing.default_limit, 50);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_assign_attempts() {
        let mut config = Config::default();
        config.codes.assign_attempts = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("assign_attempts"));
    }

    #[test]
    fn test_validate_zero_preview_sample() {
        let mut config = Config::default();
        config.codes.preview_sample = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("preview_sample"));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::new());

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("roster.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_list_limit() {
        let mut config = Config::default();
        assert_eq!(config.list_limit(), Some(50));

        config.listing.default_limit = 0;
        assert_eq!(config.list_limit(), None);
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("roster"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "roster.toml",
                r#"
                [storage]
                database_path = "/srv/roster/members.db"

                [codes]
                assign_attempts = 5
                "#,
            )?;

            let config = Config::load_from(Some(jail.directory().join("roster.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(
                config.database_path(),
                PathBuf::from("/srv/roster/members.db")
            );
            assert_eq!(config.codes.assign_attempts, 5);
            assert_eq!(config.codes.preview_sample, 5);
            Ok(())
        });
    }

    #[test]
    fn test_file_listing_section_applies() {
        Jail::expect_with(|jail| {
            jail.create_file("roster.toml", "[listing]\ndefault_limit = 0\n")?;

            let config = Config::load_from(Some(jail.directory().join("roster.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.list_limit(), None);
            assert_eq!(config.codes, CodeConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("roster.toml", "[listing]\ndefault_limit = 10\n")?;
            jail.set_env("ROSTER_LISTING__DEFAULT_LIMIT", "25");
            jail.set_env("ROSTER_CODES__PREVIEW_SAMPLE", "8");

            let config = Config::load_from(Some(jail.directory().join("roster.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.listing.default_limit, 25);
            assert_eq!(config.codes.preview_sample, 8);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.create_file("roster.toml", "[codes]\nassign_attempts = 0\n")?;

            let result = Config::load_from(Some(jail.directory().join("roster.toml")));
            assert!(matches!(result, Err(Error::ConfigValidation { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_config_serialize() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("assign_attempts"));
        assert!(json.contains("default_limit"));
    }

    #[test]
    fn test_code_config_deserialize_partial() {
        let json = r#"{"preview_sample": 12}"#;
        let codes: CodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(codes.preview_sample, 12);
        assert_eq!(codes.assign_attempts, 3);
    }
}
