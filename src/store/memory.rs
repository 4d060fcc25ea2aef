//! In-memory cache store

use crate::error::ShellResult;
use crate::store::{CacheEntry, CacheStorage, CacheStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Cache store that lives for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> ShellResult<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> ShellResult<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShellResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> ShellResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

/// Named in-memory namespaces; opening a name twice returns the same store
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    namespaces: Mutex<BTreeMap<String, Arc<MemoryCacheStore>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concrete store behind `name`
    pub async fn namespace(&self, name: &str) -> Arc<MemoryCacheStore> {
        self.namespaces
            .lock()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Names opened so far, sorted
    pub async fn names(&self) -> Vec<String> {
        self.namespaces.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> ShellResult<Arc<dyn CacheStore>> {
        let store: Arc<dyn CacheStore> = self.namespace(name).await;
        Ok(store)
    }
}
