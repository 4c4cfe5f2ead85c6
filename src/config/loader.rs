use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{info, warn};

use crate::types::SyncError;

use super::ClientConfig;

impl ClientConfig {
    /// Load configuration from `path`
    /// Falls back to defaults if the file doesn't exist or can't be parsed
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::try_load(path).await {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    projects = config.projects.len(),
                    "Loaded configuration"
                );
                config
            }
            Err(err) => {
                warn!(error = ?err, "Failed to load config.json, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from `path`. A missing file yields defaults; a file
    /// that exists but cannot be read or parsed is an error.
    pub async fn try_load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .map_err(|err| SyncError::Config(format!("Failed to read config file: {err}")))?;

        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, SyncError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(contents)
            .map_err(|err| SyncError::Config(format!("Failed to parse config.json: {err}")))
    }

    /// Atomically write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&dir)?;

        let body = serde_json::to_string_pretty(self)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)
            .map_err(|err| SyncError::Config(format!("Failed to write config file: {err}")))?;
        Ok(())
    }
}
