use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::types::SyncError;

/// Counters surfaced through the `status` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub detected: u64,
    pub uploaded: u64,
    pub failed: u64,
    pub skipped_duplicates: u64,
    pub watched_projects: usize,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub last_poll_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_poll_error: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    pub async fn write_to(&self, path: &Path) -> Result<(), SyncError> {
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(path, body).await?;
        Ok(())
    }

    pub async fn read_from(path: &Path) -> Result<Option<Self>, SyncError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}
