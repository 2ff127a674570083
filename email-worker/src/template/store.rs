//! Template storage backends.
//!
//! A [`TemplateStore`] is a read-only byte source keyed by the request's
//! `template` field. Which backend is used is decided once at startup from a
//! URL, see [`open`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::error::StorageError;

/// Get-by-key access to template sources.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Read the full contents stored under `key`.
    async fn read_all(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

// =============================================================================
// Local directory
// =============================================================================

/// Templates stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `key` below the root. Keys that would escape it are refused.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl TemplateStore for DirTemplateStore {
    async fn read_all(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| StorageError::PermissionDenied(key.to_string()))?;

        debug!(key = key, path = %path.display(), "template_file_read");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            ErrorKind::PermissionDenied => StorageError::PermissionDenied(key.to_string()),
            _ => StorageError::Io(e),
        })
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Templates held in memory. Used when no bucket is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<String, Vec<u8>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, key: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.templates.insert(key.into(), contents.into());
        self
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn read_all(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.templates
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

// =============================================================================
// HTTP(S) bucket
// =============================================================================

/// Templates fetched with GET from `base_url + key`, e.g. a public bucket.
#[derive(Debug, Clone)]
pub struct HttpTemplateStore {
    client: Client,
    base_url: Url,
}

impl HttpTemplateStore {
    pub fn new(client: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let key = key.trim_start_matches('/');
        self.base_url
            .join(key)
            .map_err(|_| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl TemplateStore for HttpTemplateStore {
    async fn read_all(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(key)?;

        debug!(key = key, url = %url, "template_http_fetch");

        let response = self.client.get(url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(StorageError::PermissionDenied(key.to_string()))
            }
            status => Err(StorageError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Open the store described by `location`.
///
/// Accepted forms:
/// - unset → empty in-memory store
/// - `mem://` → empty in-memory store
/// - `file:///path/to/dir` or a plain path → [`DirTemplateStore`]
/// - `http://…`, `https://…` → [`HttpTemplateStore`]
pub fn open(location: Option<&str>, client: &Client) -> Result<Arc<dyn TemplateStore>> {
    let location = match location.map(str::trim).filter(|l| !l.is_empty()) {
        Some(location) => location,
        None => {
            info!(backend = "memory", "template_store_opened");
            return Ok(Arc::new(MemoryTemplateStore::new()));
        }
    };

    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            info!(backend = "dir", root = location, "template_store_opened");
            return Ok(Arc::new(DirTemplateStore::new(location)));
        }
        Err(e) => return Err(e).with_context(|| format!("Invalid template bucket {location:?}")),
    };

    let store: Arc<dyn TemplateStore> = match url.scheme() {
        "mem" => Arc::new(MemoryTemplateStore::new()),
        "file" => {
            let root = url
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("Invalid file bucket {location:?}"))?;
            Arc::new(DirTemplateStore::new(root))
        }
        "http" | "https" => Arc::new(HttpTemplateStore::new(client.clone(), url.clone())),
        other => bail!("Unsupported template bucket scheme {other:?}"),
    };

    info!(backend = url.scheme(), location = location, "template_store_opened");

    Ok(store)
}
