use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::server_client::{SyncFolderSpec, UploadError, UploadReceipt};
use crate::types::SyncError;

/// Supplies the current set of folders to watch.
#[async_trait]
pub trait FolderSource: Send + Sync {
    async fn active_folders(&self) -> Result<Vec<SyncFolderSpec>, SyncError>;
}

/// Sends one file to the remote service.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, project_id: &str, file_path: &Path) -> Result<UploadReceipt, UploadError>;
}

/// Reads active projects from the local config file on every poll.
#[derive(Debug, Clone)]
pub struct LocalFolderSource {
    config_path: PathBuf,
}

impl LocalFolderSource {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

#[async_trait]
impl FolderSource for LocalFolderSource {
    async fn active_folders(&self) -> Result<Vec<SyncFolderSpec>, SyncError> {
        let config = ClientConfig::try_load(&self.config_path).await?;
        Ok(config.active_folder_specs())
    }
}
