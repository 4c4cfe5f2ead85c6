mod api_types;
mod client;
mod helpers;
mod http;
mod locator;

pub use api_types::{SyncFolderSpec, UploadReceipt};
pub use client::{SyncApi, UploadError, HEALTH_PATH, UPLOAD_PATH};
pub use helpers::{has_supported_extension, is_hidden, mime_for_path};
pub use http::HttpClient;
pub use locator::{
    LocatedServer, ServerLocator, ACTIVE_FOLDERS_PATH, FALLBACK_URL, PRODUCTION_URL,
    SERVER_URL_ENV_VAR,
};
