use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server-declared mapping of a project to a local folder the client should watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncFolderSpec {
    pub project_id: String,
    pub folder_path: PathBuf,
    #[serde(default)]
    pub project_name: String,
}

/// Body of `GET /api/sync-folders/active`. Older deployments wrap the list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActiveFoldersResponse {
    List(Vec<SyncFolderSpec>),
    Wrapped { folders: Vec<SyncFolderSpec> },
}

impl ActiveFoldersResponse {
    pub fn into_specs(self) -> Vec<SyncFolderSpec> {
        match self {
            Self::List(specs) | Self::Wrapped { folders: specs } => specs,
        }
    }
}

#[derive(Serialize)]
pub struct UploadQuery<'a> {
    #[serde(rename = "projectId")]
    pub project_id: &'a str,
}

/// Success body of `POST /api/desktop-sync/upload`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "imageId")]
    pub image_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
