use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the desktop sync client, stored as camelCase JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub server_url: Option<String>,

    /// Extra explicit server candidates, probed after `server_url`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_candidates: Vec<String>,

    /// Bearer token sent with uploads. Unset means uploads are anonymous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    #[serde(default)]
    pub settings: Settings,
}

/// A locally configured project folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    pub folder_path: PathBuf,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Where the orchestrator gets its list of folders from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FolderSourceKind {
    #[default]
    Server,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Folder-list poll interval in seconds.
    #[serde(default = "default_watch_interval")]
    pub watch_interval: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,

    #[serde(default)]
    pub retry_failed_uploads: bool,

    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,

    #[serde(default = "default_stability_poll_ms")]
    pub stability_poll_ms: u64,

    #[serde(default = "default_debounce_delay_ms")]
    pub debounce_delay_ms: u64,

    #[serde(default)]
    pub folder_source: FolderSourceKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_interval: default_watch_interval(),
            max_retries: default_max_retries(),
            supported_formats: default_supported_formats(),
            retry_failed_uploads: false,
            stability_window_ms: default_stability_window_ms(),
            stability_poll_ms: default_stability_poll_ms(),
            debounce_delay_ms: default_debounce_delay_ms(),
            folder_source: FolderSourceKind::default(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval.max(1))
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    pub fn stability_poll(&self) -> Duration {
        Duration::from_millis(self.stability_poll_ms.max(10))
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }
}

fn default_active() -> bool {
    true
}

fn default_watch_interval() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_supported_formats() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "gif", "heic", "heif", "bmp", "tiff"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_stability_window_ms() -> u64 {
    2000
}

fn default_stability_poll_ms() -> u64 {
    100
}

fn default_debounce_delay_ms() -> u64 {
    1000
}
