// Configuration file and storage backend selection

use crate::storage::{FileStorage, MemoryStorage, SqliteStorage, Storage, validate_key};
use crate::store::DEFAULT_KEY;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            data_dir: default_data_dir(),
            key: DEFAULT_KEY.to_string(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todostore")
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("todostore").join("config.yaml"))
}

impl Config {
    /// Load from an explicit path, or the default location if it exists,
    /// or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config file {:?}", path))?;
        debug!(?path, backend = ?config.backend, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML")?
        };
        config.data_dir = expand_home(&config.data_dir);
        validate_key(&config.key)?;
        Ok(config)
    }

    /// Where the configured backend keeps its data
    pub fn location(&self) -> PathBuf {
        match self.backend {
            Backend::File => self.data_dir.clone(),
            Backend::Sqlite => self.data_dir.join("todostore.db"),
            Backend::Memory => PathBuf::from(":memory:"),
        }
    }

    pub fn open_storage(&self) -> Result<Box<dyn Storage>> {
        let storage: Box<dyn Storage> = match self.backend {
            Backend::File => Box::new(FileStorage::open(&self.data_dir)?),
            Backend::Sqlite => Box::new(SqliteStorage::open(self.location())?),
            Backend::Memory => Box::new(MemoryStorage::new()),
        };
        Ok(storage)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|h| h.join(rest)).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.key, DEFAULT_KEY);
        assert!(config.data_dir.ends_with("todostore"));
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = Config::from_yaml("backend: sqlite\n").unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.key, DEFAULT_KEY);
        assert!(config.location().ends_with("todostore.db"));
    }

    #[test]
    fn test_from_yaml_empty() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_from_yaml_rejects_bad_key() {
        assert!(Config::from_yaml("key: ../escape\n").is_err());
    }

    #[test]
    fn test_from_yaml_rejects_unknown_backend() {
        assert!(Config::from_yaml("backend: redis\n").is_err());
    }

    #[test]
    fn test_expand_home() {
        let config = Config::from_yaml("data_dir: ~/todos\n").unwrap();
        assert!(!config.data_dir.starts_with("~"));
        assert!(config.data_dir.ends_with("todos"));
    }

    #[test]
    fn test_from_file_and_open_storage() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        let data_dir = temp.path().join("data");
        fs::write(
            &config_path,
            format!("backend: file\ndata_dir: {}\nkey: mine\n", data_dir.display()),
        )
        .unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.key, "mine");
        assert_eq!(config.location(), data_dir);

        let storage = config.open_storage().unwrap();
        assert_eq!(storage.name(), "file");
        assert!(data_dir.exists());
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp.path().join("nope.yaml"))).is_err());
    }
}
