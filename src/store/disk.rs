//! On-disk cache store
//!
//! Layout under `<root>/<cache name>/`:
//!
//! - `<digest>.json` key, status, headers, revision, timestamp, body file
//! - `<digest>-<write id>.body` raw response body, one file per write
//!
//! `<digest>` is the first 16 hex chars of SHA256(key). A write puts the
//! body under a fresh name first and then renames the metadata into place,
//! so metadata always names a body written together with it. The body it
//! replaced is removed afterwards.

use crate::error::{ShellError, ShellResult};
use crate::network::Response;
use crate::store::{CacheEntry, CacheStorage, CacheStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Metadata persisted next to each body
#[derive(Debug, Serialize, Deserialize)]
struct StoredMeta {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
    stored_revision: Option<String>,
    stored_at: DateTime<Utc>,
    body_file: String,
    body_len: u64,
}

/// Namespaces stored as directories below one cache root
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a namespace with its concrete type
    pub async fn namespace(&self, name: &str) -> ShellResult<DiskCacheStore> {
        DiskCacheStore::open(&self.root, name).await
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> ShellResult<Arc<dyn CacheStore>> {
        let store: Arc<dyn CacheStore> = Arc::new(self.namespace(name).await?);
        Ok(store)
    }
}

/// Cache store persisted as files in one namespace directory
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    dir: PathBuf,
    name: String,
}

impl DiskCacheStore {
    /// Open (creating if needed) the namespace `cache_name` below `root`
    pub async fn open(root: &Path, cache_name: &str) -> ShellResult<Self> {
        if cache_name.is_empty() || cache_name.contains(['/', '\\']) || cache_name.starts_with('.') {
            return Err(ShellError::User(format!(
                "Invalid cache name '{}': must be a plain directory name",
                cache_name
            )));
        }

        let dir = root.join(cache_name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellError::io(format!("creating cache directory {}", dir.display()), e))?;

        debug!("Opened cache store {}", dir.display());
        Ok(Self {
            dir,
            name: cache_name.to_string(),
        })
    }

    /// Namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total bytes of stored bodies
    pub async fn size_bytes(&self) -> ShellResult<u64> {
        let mut total = 0;
        for meta in self.read_all_meta().await? {
            total += meta.body_len;
        }
        Ok(total)
    }

    fn digest(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::digest(key)))
    }

    async fn read_meta(&self, path: &Path) -> ShellResult<Option<StoredMeta>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShellError::io(format!("reading {}", path.display()), e)),
        }
    }

    /// Metadata for `key`, ignoring digest collisions
    async fn meta_for(&self, key: &str) -> ShellResult<Option<StoredMeta>> {
        match self.read_meta(&self.meta_path(key)).await? {
            Some(meta) if meta.key != key => {
                warn!("Cache digest collision between {} and {}", meta.key, key);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn read_all_meta(&self) -> ShellResult<Vec<StoredMeta>> {
        let mut metas = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| ShellError::io(format!("reading cache directory {}", self.dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShellError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match self.read_meta(&path).await {
                    Ok(Some(meta)) => metas.push(meta),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping unreadable cache metadata {}: {}", path.display(), e),
                }
            }
        }
        Ok(metas)
    }

    async fn read_body(&self, meta: &StoredMeta) -> ShellResult<Option<Vec<u8>>> {
        let path = self.dir.join(&meta.body_file);
        match fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShellError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> ShellResult<()> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_extension(format!("{}.tmp", ext));
        fs::write(&tmp, contents)
            .await
            .map_err(|e| ShellError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| ShellError::io(format!("renaming into {}", path.display()), e))
    }

    async fn remove_body(&self, body_file: &str) {
        let path = self.dir.join(body_file);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove replaced body {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn get(&self, key: &str) -> ShellResult<Option<CacheEntry>> {
        // A concurrent overwrite may remove the body between the two reads;
        // the second pass picks up the replacing metadata.
        for _ in 0..2 {
            let Some(meta) = self.meta_for(key).await? else {
                return Ok(None);
            };
            let Some(body) = self.read_body(&meta).await? else {
                continue;
            };
            return Ok(Some(CacheEntry {
                key: meta.key,
                response: Response {
                    status: meta.status,
                    headers: meta.headers,
                    body,
                },
                stored_revision: meta.stored_revision,
                stored_at: meta.stored_at,
            }));
        }

        warn!("Cache body missing for {}, treating as miss", key);
        Ok(None)
    }

    async fn put(&self, entry: CacheEntry) -> ShellResult<()> {
        let previous = self.meta_for(&entry.key).await.ok().flatten();

        let body_file = format!("{}-{}.body", Self::digest(&entry.key), Uuid::new_v4().simple());
        self.write_atomic(&self.dir.join(&body_file), &entry.response.body)
            .await?;

        let meta = StoredMeta {
            key: entry.key.clone(),
            status: entry.response.status,
            headers: entry.response.headers,
            stored_revision: entry.stored_revision,
            stored_at: entry.stored_at,
            body_file,
            body_len: entry.response.body.len() as u64,
        };
        let json = serde_json::to_vec_pretty(&meta)?;
        if let Err(e) = self.write_atomic(&self.meta_path(&entry.key), &json).await {
            self.remove_body(&meta.body_file).await;
            return Err(e);
        }

        if let Some(previous) = previous.filter(|p| p.body_file != meta.body_file) {
            self.remove_body(&previous.body_file).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShellResult<bool> {
        let Some(meta) = self.meta_for(key).await? else {
            return Ok(false);
        };

        let meta_path = self.meta_path(key);
        match fs::remove_file(&meta_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ShellError::io(format!("removing {}", meta_path.display()), e)),
        }

        let body_path = self.dir.join(&meta.body_file);
        if let Err(e) = fs::remove_file(&body_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(ShellError::io(format!("removing {}", body_path.display()), e));
            }
        }
        Ok(true)
    }

    async fn keys(&self) -> ShellResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .read_all_meta()
            .await?
            .into_iter()
            .map(|meta| meta.key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn store_name(&self) -> &str {
        &self.name
    }
}
