//! Persistent response cache
//!
//! Entries are keyed by [`PrecacheEntry::cache_key`](crate::manifest::PrecacheEntry::cache_key)
//! (the manifest URL plus its revision) and carry the revision they were
//! stored at. Only the worker writes to a store: install adds, activate
//! deletes, and a cache-first miss may repair a single entry.
//!
//! A [`CacheStorage`] hands out one store per namespace. Each registered
//! scope gets its own namespace ([`scope_namespace`]), so one scope's
//! activation never removes another scope's entries.
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | [`MemoryCacheStore`] | process lifetime | tests, embedding |
//! | [`DiskCacheStore`] | survives restarts | CLI, long-lived hosts |

mod disk;
mod memory;

pub use disk::{DiskCacheStorage, DiskCacheStore};
pub use memory::{MemoryCacheStorage, MemoryCacheStore};

use crate::error::ShellResult;
use crate::network::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A cached response plus the revision it was stored at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Manifest URL the entry is stored under
    pub key: String,
    /// Stored response
    pub response: Response,
    /// Manifest revision at the time of storing
    pub stored_revision: Option<String>,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(key: impl Into<String>, response: Response, stored_revision: Option<String>) -> Self {
        Self {
            key: key.into(),
            response,
            stored_revision,
            stored_at: Utc::now(),
        }
    }

    /// Whether this entry is current for the given manifest revision
    pub fn matches_revision(&self, revision: Option<&str>) -> bool {
        self.stored_revision.as_deref() == revision
    }
}

/// Key-value response cache shared by install, activate and fetch
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read an entry
    async fn get(&self, key: &str) -> ShellResult<Option<CacheEntry>>;

    /// Write an entry, replacing any entry with the same key
    async fn put(&self, entry: CacheEntry) -> ShellResult<()>;

    /// Remove an entry; returns whether it existed
    async fn delete(&self, key: &str) -> ShellResult<bool>;

    /// All stored keys, sorted
    async fn keys(&self) -> ShellResult<Vec<String>>;

    /// Human-readable backend name for display
    fn store_name(&self) -> &str;
}

/// Opens cache namespaces by name
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open (creating if needed) the namespace `name`
    async fn open(&self, name: &str) -> ShellResult<Arc<dyn CacheStore>>;
}

/// Namespace holding the precache of `scope`
///
/// The root scope uses the bare cache name; any other scope appends a
/// short digest of its path.
pub fn scope_namespace(cache_name: &str, scope: &str) -> String {
    if scope == "/" {
        return cache_name.to_string();
    }
    let digest = Sha256::digest(scope.as_bytes());
    format!("{}-{}", cache_name, hex::encode(&digest[..4]))
}
