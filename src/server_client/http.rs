use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::types::SyncError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("photo-desktop-sync/", env!("CARGO_PKG_VERSION"));

/// Shared reqwest client bound to one resolved server base URL.
#[derive(Clone, Debug)]
pub struct HttpClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self, SyncError> {
        Ok(Self::with_client(build_client()?, base_url, auth_token))
    }

    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        auth_token: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let auth_token = auth_token.filter(|token| !token.trim().is_empty());
        Self {
            http,
            base_url,
            auth_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str, timeout: Duration) -> RequestBuilder {
        self.http.get(self.url(path)).timeout(timeout)
    }

    /// POST request carrying the bearer token when one is configured.
    pub fn post(&self, path: &str, timeout: Duration) -> RequestBuilder {
        let request = self.http.post(self.url(path)).timeout(timeout);
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Build the reqwest client shared by discovery, polling and uploads.
pub fn build_client() -> Result<Client, SyncError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(SyncError::Http)
}
