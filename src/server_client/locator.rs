use std::env;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

use super::helpers::push_unique_url;

pub const ACTIVE_FOLDERS_PATH: &str = "/api/sync-folders/active";
pub const SERVER_URL_ENV_VAR: &str = "PHOTO_SYNC_SERVER_URL";
pub const PRODUCTION_URL: &str = "https://photo-share.vercel.app";
pub const FALLBACK_URL: &str = "http://localhost:3000";
const LOCAL_DEV_PORTS: [u16; 3] = [3000, 3001, 3002];
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of base URL discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedServer {
    /// A candidate answered the probe.
    Resolved(String),
    /// Nothing answered; the hard-coded fallback is used unprobed.
    Fallback(String),
}

impl LocatedServer {
    pub fn url(&self) -> &str {
        match self {
            Self::Resolved(url) | Self::Fallback(url) => url,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Probes candidate base URLs in priority order and picks the first live one.
#[derive(Debug, Clone)]
pub struct ServerLocator {
    http: Client,
    probe_timeout: Duration,
    fallback: String,
}

impl ServerLocator {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            probe_timeout: PROBE_TIMEOUT,
            fallback: FALLBACK_URL.to_string(),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Candidate list: explicit overrides, local dev ports ascending, production last.
    pub fn candidates(config: &ClientConfig) -> Vec<String> {
        let mut urls = Vec::new();
        if let Ok(custom) = env::var(SERVER_URL_ENV_VAR) {
            push_unique_url(&mut urls, custom);
        }
        if let Some(url) = &config.server_url {
            push_unique_url(&mut urls, url.clone());
        }
        for url in &config.server_candidates {
            push_unique_url(&mut urls, url.clone());
        }
        for port in LOCAL_DEV_PORTS {
            push_unique_url(&mut urls, format!("http://localhost:{port}"));
        }
        push_unique_url(&mut urls, PRODUCTION_URL.to_string());
        urls
    }

    pub async fn locate(&self, candidates: &[String]) -> LocatedServer {
        for candidate in candidates {
            let candidate = candidate.trim().trim_end_matches('/');
            if candidate.is_empty() {
                continue;
            }
            if self.probe(candidate).await {
                info!(url = %candidate, "Server located");
                return LocatedServer::Resolved(candidate.to_string());
            }
        }

        warn!(
            fallback = %self.fallback,
            tried = candidates.len(),
            "No server candidate responded, using fallback"
        );
        LocatedServer::Fallback(self.fallback.clone())
    }

    /// 200 and 404 both mean a server process is listening.
    async fn probe(&self, base: &str) -> bool {
        let url = format!("{base}{ACTIVE_FOLDERS_PATH}");
        match self.http.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) => {
                let status = response.status();
                let alive = status == StatusCode::OK || status == StatusCode::NOT_FOUND;
                debug!(url = %url, status = %status, alive, "Probed server candidate");
                alive
            }
            Err(err) => {
                debug!(url = %url, error = %err, "Server candidate unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn serve(status: AxumStatus) -> String {
        let app = Router::new().route(ACTIVE_FOLDERS_PATH, get(move || async move { status }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Accepts connections and never answers.
    async fn black_hole() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    fn locator() -> ServerLocator {
        ServerLocator::new(Client::new()).with_probe_timeout(Duration::from_millis(300))
    }

    #[tokio::test]
    async fn returns_fallback_when_nothing_answers() {
        let silent = black_hole().await;
        let candidates = vec![
            String::new(),
            "http://127.0.0.1:1".to_string(),
            silent,
            "not a url".to_string(),
        ];

        let located = locator()
            .with_fallback("http://fallback.invalid")
            .locate(&candidates)
            .await;
        assert_eq!(
            located,
            LocatedServer::Fallback("http://fallback.invalid".to_string())
        );
        assert!(located.is_fallback());
    }

    #[tokio::test]
    async fn not_found_counts_as_alive_but_server_errors_do_not() {
        let broken = serve(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let missing_route = serve(AxumStatus::NOT_FOUND).await;
        let healthy = serve(AxumStatus::OK).await;

        let located = locator()
            .locate(&[broken, missing_route.clone(), healthy])
            .await;
        assert_eq!(located, LocatedServer::Resolved(missing_route));
    }

    #[test]
    fn candidate_order_puts_overrides_first_and_production_last() {
        let config = ClientConfig {
            server_url: Some("http://studio.local:8080/".to_string()),
            server_candidates: vec!["http://localhost:3001".to_string()],
            ..ClientConfig::default()
        };
        let urls = ServerLocator::candidates(&config);
        let studio = urls.iter().position(|u| u == "http://studio.local:8080").unwrap();
        let dev_3000 = urls.iter().position(|u| u == "http://localhost:3000").unwrap();
        let dev_3001 = urls.iter().position(|u| u == "http://localhost:3001").unwrap();

        assert!(studio < dev_3001);
        // explicit candidate keeps its early slot, ahead of the lower port
        assert!(dev_3001 < dev_3000);
        assert_eq!(urls.last().map(String::as_str), Some(PRODUCTION_URL));
        assert_eq!(
            urls.iter().filter(|u| *u == "http://localhost:3001").count(),
            1
        );
    }
}
