//! Repository configuration and identity, stored as JSON beside the objects

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of the metadata directory inside a working tree
pub const METADATA_DIR: &str = ".dvc";

/// Repository configuration stored at `.dvc/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Branch created by `init`.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Whether push and fetch append sync log entries.
    #[serde(default = "default_sync_log")]
    pub sync_log: bool,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_sync_log() -> bool {
    true
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            sync_log: default_sync_log(),
        }
    }
}

impl RepoConfig {
    const FILE: &'static str = "config.json";

    /// Load config from a metadata directory, falling back to defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(Self::FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        let config: RepoConfig =
            serde_json::from_str(&data).with_context(|| "Failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a metadata directory.
    pub fn save(&self, root: &Path) -> Result<()> {
        let config_path = root.join(Self::FILE);
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }
}

/// Repository identity stored at `.dvc/metadata.json`.
///
/// Never hashed into any object, so root commits stay identical across
/// independently created repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub uuid: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl RepositoryMetadata {
    const FILE: &'static str = "metadata.json";

    pub fn new() -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join(Self::FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read metadata from {:?}", path))?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(Self::FILE);
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&path, data)?;
        Ok(())
    }
}

impl Default for RepositoryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults_when_missing() {
        let tmp = TempDir::new().unwrap();
        let config = RepoConfig::load(tmp.path()).unwrap();
        assert_eq!(config.default_branch, "master");
        assert!(config.sync_log);
    }

    #[test]
    fn test_config_partial_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.json"), r#"{"sync_log": false}"#).unwrap();
        let config = RepoConfig::load(tmp.path()).unwrap();
        assert_eq!(config.default_branch, "master");
        assert!(!config.sync_log);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let config = RepoConfig {
            default_branch: "main".into(),
            sync_log: false,
        };
        config.save(tmp.path()).unwrap();
        assert_eq!(RepoConfig::load(tmp.path()).unwrap(), config);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let tmp = TempDir::new().unwrap();
        assert!(RepositoryMetadata::load(tmp.path()).unwrap().is_none());
        let meta = RepositoryMetadata::new();
        meta.save(tmp.path()).unwrap();
        assert_eq!(RepositoryMetadata::load(tmp.path()).unwrap(), Some(meta.clone()));
        assert_ne!(meta.uuid, RepositoryMetadata::new().uuid);
    }
}
