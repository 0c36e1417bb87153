//! Configuration for Attune.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::history::DEFAULT_DEPTH;
use crate::sync::SyncBus;

/// Attune configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the workspace snapshot, deployed documents and logs.
    pub data_dir: PathBuf,
    /// Undo history settings.
    pub history: HistorySettings,
    /// Cross-surface sync settings.
    pub sync: SyncSettings,
    /// Deployment settings.
    pub deploy: DeploySettings,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("attune");

        Self {
            data_dir,
            history: HistorySettings::default(),
            sync: SyncSettings::default(),
            deploy: DeploySettings::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/attune/attune.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join("attune").join("attune.yml");
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./attune.yml
        let fallback_config = PathBuf::from("attune.yml");
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.history.depth == 0 {
            return Err(Error::Config("history.depth must be at least 1".to_string()));
        }
        if self.sync.channel_capacity == 0 {
            return Err(Error::Config("sync.channel_capacity must be at least 1".to_string()));
        }
        if self.sync.snapshot_file.trim().is_empty() {
            return Err(Error::Config("sync.snapshot_file must not be empty".to_string()));
        }
        if self.deploy.dir_name.trim().is_empty() {
            return Err(Error::Config("deploy.dir_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Path of the shared workspace snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.sync.snapshot_file)
    }

    /// Directory holding the deployed documents.
    pub fn deploy_dir(&self) -> PathBuf {
        self.data_dir.join(&self.deploy.dir_name)
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Sync bus sized by `sync.channel_capacity`.
    pub fn sync_bus(&self) -> SyncBus {
        SyncBus::with_capacity(self.sync.channel_capacity)
    }
}

/// Undo history settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of undoable changes.
    pub depth: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { depth: DEFAULT_DEPTH }
    }
}

/// Cross-surface sync settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Persist and broadcast committed changes.
    pub enabled: bool,
    /// Notices buffered per subscriber before it lags.
    pub channel_capacity: usize,
    /// Snapshot file name inside the data directory.
    pub snapshot_file: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 256,
            snapshot_file: "workspace.json".to_string(),
        }
    }
}

/// Deployment settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Directory name inside the data directory.
    pub dir_name: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            dir_name: "deployed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.history.depth, 100);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.channel_capacity, 256);
        assert!(config.data_dir.ends_with("attune"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_paths() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/test"),
            ..Default::default()
        };

        assert_eq!(config.snapshot_path(), PathBuf::from("/tmp/test/workspace.json"));
        assert_eq!(config.deploy_dir(), PathBuf::from("/tmp/test/deployed"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/test/logs"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yml");

        let config_content = r#"
data_dir: /custom/path
history:
  depth: 25
sync:
  enabled: false
  snapshot_file: shared.json
deploy:
  dir_name: live
"#;
        fs::write(&config_path, config_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/path"));
        assert_eq!(config.history.depth, 25);
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.channel_capacity, 256);
        assert_eq!(config.snapshot_path(), PathBuf::from("/custom/path/shared.json"));
        assert_eq!(config.deploy_dir(), PathBuf::from("/custom/path/live"));
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yml");
        fs::write(&config_path, "history:\n  depth: 0\n").unwrap();
        assert!(Config::load(Some(&config_path)).is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
