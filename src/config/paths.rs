use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::ClientConfig;

pub const CONFIG_ENV_VAR: &str = "PHOTO_SYNC_CONFIG";
const CONFIG_DIR_NAME: &str = ".photo-sync";
const CONFIG_FILE_NAME: &str = "config.json";
const STATUS_FILE_NAME: &str = "status.json";

impl ClientConfig {
    /// Get the path to the config.json file
    /// Honors `PHOTO_SYNC_CONFIG`, then `$HOME/.photo-sync/config.json`
    pub fn default_path() -> PathBuf {
        if let Ok(custom) = env::var(CONFIG_ENV_VAR) {
            let trimmed = custom.trim();
            if !trimmed.is_empty() {
                debug!(path = %trimmed, "Using config path from environment");
                return PathBuf::from(trimmed);
            }
        }

        if let Some(home) = env::var_os("HOME").filter(|home| !home.is_empty()) {
            return PathBuf::from(home).join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        }

        // Fallback: look in current directory
        warn!("HOME is not set, looking for config.json in current directory");
        PathBuf::from(CONFIG_FILE_NAME)
    }
}

/// Status snapshot written by a running client, next to its config file.
pub fn status_path_for(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(STATUS_FILE_NAME),
        _ => PathBuf::from(STATUS_FILE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_file_sits_next_to_config() {
        let status = status_path_for(Path::new("/tmp/sync/config.json"));
        assert_eq!(status, PathBuf::from("/tmp/sync/status.json"));

        let bare = status_path_for(Path::new("config.json"));
        assert_eq!(bare, PathBuf::from("status.json"));
    }
}
