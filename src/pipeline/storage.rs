//! Object storage backends
//!
//! The pipeline only needs `put(path, bytes)`. Local disk and Google Cloud Storage are
//! provided; the in-memory store backs dry runs and tests.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Google Cloud Storage JSON API base URL
pub const GCS_API_URL: &str = "https://storage.googleapis.com";

/// Bucket used when neither config nor environment name one
pub const DEFAULT_GCS_BUCKET: &str = "keiba-analysis-keiba-data";

/// A single failed write. Never fails the batch it belongs to.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error writing {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("storage rejected {path}: {status} - {body}")]
    Rejected {
        path: String,
        status: u16,
        body: String,
    },
    #[error("snapshot for {path} could not be serialized: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Destination for committed snapshots
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` at `path`; `Ok` means the write is confirmed
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), CommitError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Writes objects as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), CommitError> {
        let target = self.root.join(path);
        let io_err = |source| CommitError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let temp = target.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&temp, &target).await.map_err(io_err)?;

        tracing::debug!(path = %target.display(), bytes = bytes.len(), "Wrote object");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

/// Configuration for the GCS backend
#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub base_url: String,
    pub bucket: String,
    /// Environment variable holding an OAuth2 access token
    pub token_env: String,
    pub timeout: Duration,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            base_url: GCS_API_URL.to_string(),
            bucket: DEFAULT_GCS_BUCKET.to_string(),
            token_env: "GCS_ACCESS_TOKEN".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Uploads objects with the GCS JSON API (simple media upload)
pub struct GcsStore {
    config: GcsConfig,
    token: String,
    client: Client,
}

impl GcsStore {
    /// Build the client; fails when the token variable is unset
    pub fn new(config: GcsConfig) -> Result<Self, CommitError> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            CommitError::Unavailable(format!("{} is not set", config.token_env))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CommitError::Unavailable(e.to_string()))?;

        tracing::info!(bucket = %config.bucket, "GCS client initialized");
        Ok(Self {
            config,
            token,
            client,
        })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.config.base_url, self.config.bucket
        )
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), CommitError> {
        let response = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", path)])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|source| CommitError::Http {
                path: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CommitError::Rejected {
                path: path.to_string(),
                status,
                body,
            });
        }

        tracing::debug!(bucket = %self.config.bucket, path, "Uploaded object");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("gs://{}", self.config.bucket)
    }
}

/// Keeps objects in memory; paths under a failing prefix are rejected
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: RwLock<Vec<String>>,
    failing: RwLock<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every put whose path starts with `prefix`
    pub async fn fail_prefix(&self, prefix: impl Into<String>) {
        self.failing.write().await.insert(prefix.into());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    pub async fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(path).cloned()
    }

    /// Every successful put, in order
    pub async fn writes(&self) -> Vec<String> {
        self.writes.read().await.clone()
    }

    pub async fn write_count(&self) -> usize {
        self.writes.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), CommitError> {
        let failing = self
            .failing
            .read()
            .await
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        if failing {
            return Err(CommitError::Rejected {
                path: path.to_string(),
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        self.objects.write().await.insert(path.to_string(), bytes);
        self.writes.write().await.push(path.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
