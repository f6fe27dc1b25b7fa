//! Throttled HTTP fetching.
//!
//! Posts JSON to upstream APIs, spacing requests at least `request_delay`
//! apart, and optionally archives every raw response body to the raw data
//! directory for later inspection or replay.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Content too large: {size} bytes (max {max_size})")]
    ContentTooLarge { size: usize, max_size: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Where raw responses are archived; `None` disables archiving
    pub archive_dir: Option<PathBuf>,

    /// Maximum response size to accept
    pub max_content_size: usize,

    pub timeout: Duration,

    pub user_agent: String,

    /// Minimum spacing between requests
    pub request_delay: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            archive_dir: None,
            max_content_size: 2 * 1024 * 1024,
            timeout: Duration::from_secs(30),
            user_agent: concat!("rank-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
            request_delay: Duration::from_secs(1),
        }
    }
}

/// HTTP client that serializes and spaces out its requests.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
    last_request: Mutex<Option<Instant>>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("rank-tracker")),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Wait until `request_delay` has passed since the previous request.
    ///
    /// Holding the lock across the sleep makes concurrent callers queue up.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.config.request_delay;
            if ready_at > Instant::now() {
                debug!("Throttling for {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// POST `body` as JSON and decode the JSON response.
    pub async fn post_json<B, R>(&self, url: &Url, body: &B) -> Result<R, FetchError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let archive = self.archive_path(url, &payload);
        self.throttle().await;

        debug!("POST {}", url);
        let response = self
            .client
            .post(url.as_str())
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                host: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let content = response.bytes().await?;
        if content.len() > self.config.max_content_size {
            return Err(FetchError::ContentTooLarge {
                size: content.len(),
                max_size: self.config.max_content_size,
            });
        }

        if let Some(path) = archive {
            // An archive failure never fails the fetch.
            if let Err(e) = write_archive(&path, &content).await {
                warn!("Failed to archive response to {:?}: {}", path, e);
            }
        }

        Ok(serde_json::from_slice(&content)?)
    }

    /// Archive location for one response: `<dir>/<host>/<hash>-<unix ts>.json`,
    /// where the hash identifies the request.
    fn archive_path(&self, url: &Url, payload: &[u8]) -> Option<PathBuf> {
        let dir = self.config.archive_dir.as_ref()?;
        let host = url.host_str().unwrap_or("unknown");
        Some(dir.join(host).join(format!(
            "{}-{}.json",
            Self::request_hash(url, payload),
            Utc::now().timestamp()
        )))
    }

    /// Hash a request to a short string.
    fn request_hash(url: &Url, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_str().as_bytes());
        hasher.update(payload);
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

async fn write_archive(path: &Path, content: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}
