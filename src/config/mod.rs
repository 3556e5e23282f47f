//! Configuration management for `cms-migrate`.
//!
//! Configuration is loaded from, in increasing precedence:
//! - Built-in defaults
//! - Project config (`<project>/cms-migrate.yaml`, optional)
//! - Environment variable overrides (`CMS_MIGRATE_*`)
//!
//! Relative paths resolve against the project directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use cms_migrate_lib::export::DEFAULT_API_PREFIX;
use cms_migrate_lib::store::DEFAULT_UPLOADS_DIR;

pub const CONFIG_FILE: &str = "cms-migrate.yaml";
pub const DEFAULT_EXPORT_DIR: &str = "export-data";

pub const ENV_UPLOADS_DIR: &str = "CMS_MIGRATE_UPLOADS_DIR";
pub const ENV_EXPORT_DIR: &str = "CMS_MIGRATE_EXPORT_DIR";
pub const ENV_API_PREFIX: &str = "CMS_MIGRATE_API_PREFIX";
pub const ENV_LOG_FILE: &str = "CMS_MIGRATE_LOG_FILE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// File-level settings; every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub uploads_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub api_prefix: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project: PathBuf,
    /// Backend upload directory.
    pub uploads_dir: PathBuf,
    /// Where export archives are written.
    pub export_dir: PathBuf,
    /// Prefix of application content types.
    pub api_prefix: String,
    /// Optional JSON log destination.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration for a project using the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load(project: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(project, |key| std::env::var(key).ok())
    }

    /// Load configuration with an injectable environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load_with_env<F>(project: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project = dunce::canonicalize(project).unwrap_or_else(|_| project.to_path_buf());
        let file = read_file_config(&project.join(CONFIG_FILE))?;

        let env_path = |key: &str| env(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let uploads_dir = env_path(ENV_UPLOADS_DIR)
            .or(file.uploads_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR));
        let export_dir = env_path(ENV_EXPORT_DIR)
            .or(file.export_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR));
        let api_prefix = env(ENV_API_PREFIX)
            .filter(|v| !v.trim().is_empty())
            .or(file.api_prefix)
            .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());
        let log_file = env_path(ENV_LOG_FILE).or(file.log_file);

        Ok(Self {
            uploads_dir: project.join(uploads_dir),
            export_dir: project.join(export_dir),
            api_prefix,
            log_file: log_file.map(|p| project.join(p)),
            project,
        })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), env_of(&[])).unwrap();

        assert!(config.uploads_dir.ends_with("public/uploads"));
        assert!(config.export_dir.ends_with("export-data"));
        assert!(config.uploads_dir.starts_with(&config.project));
        assert_eq!(config.api_prefix, "api::");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "uploads_dir: media\nexport_dir: out\napi_prefix: \"app::\"\n",
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), env_of(&[(ENV_EXPORT_DIR, "/tmp/exports")])).unwrap();

        assert!(config.uploads_dir.ends_with("media"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.api_prefix, "app::");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "unknown_key: 1\n").unwrap();

        let err = Config::load_with_env(dir.path(), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
