use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::sync::{FolderSource, Uploader};
use crate::types::SyncError;

use super::api_types::{ActiveFoldersResponse, ErrorBody, SyncFolderSpec, UploadQuery, UploadReceipt};
use super::helpers::mime_for_path;
use super::http::{build_client, HttpClient};
use super::locator::{LocatedServer, ServerLocator, ACTIVE_FOLDERS_PATH};

pub const UPLOAD_PATH: &str = "/api/desktop-sync/upload";
pub const HEALTH_PATH: &str = "/api/health";
const LIST_TIMEOUT: Duration = Duration::from_secs(15);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single upload did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("authentication required: log into the web app and try again")]
    Unauthorized,

    #[error("server rejected upload with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to read file: {0}")]
    Read(String),

    #[error("could not build upload request: {0}")]
    Request(String),
}

impl UploadError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Rejected { status, .. } => Some(*status),
            Self::Network(_) | Self::Read(_) | Self::Request(_) => None,
        }
    }
}

/// Client for the web service's desktop sync endpoints.
#[derive(Clone, Debug)]
pub struct SyncApi {
    http: HttpClient,
}

impl SyncApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Resolve the server base URL from config/env and prepare an HTTP client.
    pub async fn discover(config: &ClientConfig) -> Result<(Self, LocatedServer), SyncError> {
        let client = build_client()?;
        let candidates = ServerLocator::candidates(config);
        let located = ServerLocator::new(client.clone()).locate(&candidates).await;
        let http = HttpClient::with_client(client, located.url(), config.auth_token.clone());
        Ok((Self::new(http), located))
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Fetch the folders the server wants this client to watch.
    /// 404 means the server is up but has nothing configured yet.
    pub async fn fetch_active_folders(&self) -> Result<Vec<SyncFolderSpec>, SyncError> {
        let response = self.http.get(ACTIVE_FOLDERS_PATH, LIST_TIMEOUT).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let parsed: ActiveFoldersResponse = serde_json::from_str(&body)?;
                Ok(parsed.into_specs())
            }
            StatusCode::NOT_FOUND => {
                debug!("Active folders route not found, treating as empty");
                Ok(Vec::new())
            }
            status => Err(SyncError::Server(format!(
                "{ACTIVE_FOLDERS_PATH} returned {status}"
            ))),
        }
    }

    pub async fn health(&self) -> bool {
        match self.http.get(HEALTH_PATH, HEALTH_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Health check returned non-success");
                false
            }
            Err(err) => {
                warn!(error = %err, "Health check failed");
                false
            }
        }
    }

    /// POST one file as multipart/form-data to the upload endpoint.
    pub async fn upload_file(
        &self,
        project_id: &str,
        file_path: &Path,
    ) -> Result<UploadReceipt, UploadError> {
        let bytes = fs::read(file_path)
            .await
            .map_err(|err| UploadError::Read(format!("{}: {err}", file_path.display())))?;
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let size = bytes.len();

        let form = Form::new().part("file", file_part(file_path, file_name.clone(), bytes)?);

        let response = self
            .http
            .post(UPLOAD_PATH, UPLOAD_TIMEOUT)
            .query(&UploadQuery { project_id })
            .multipart(form)
            .send()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED {
            return Err(UploadError::Unauthorized);
        }
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let receipt = serde_json::from_str::<UploadReceipt>(&body).unwrap_or_else(|_| UploadReceipt {
            success: true,
            ..UploadReceipt::default()
        });
        info!(
            project = %project_id,
            file = %file_name,
            bytes = size,
            image_id = ?receipt.image_id,
            "Uploaded file"
        );
        Ok(receipt)
    }
}

/// The single `file` part of an upload, typed from the extension.
fn file_part(file_path: &Path, file_name: String, bytes: Vec<u8>) -> Result<Part, UploadError> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for_path(file_path))
        .map_err(|err| UploadError::Request(err.to_string()))
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl FolderSource for SyncApi {
    async fn active_folders(&self) -> Result<Vec<SyncFolderSpec>, SyncError> {
        self.fetch_active_folders().await
    }
}

#[async_trait]
impl Uploader for SyncApi {
    async fn upload(&self, project_id: &str, file_path: &Path) -> Result<UploadReceipt, UploadError> {
        self.upload_file(project_id, file_path).await
    }
}
