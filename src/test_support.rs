//! Fakes shared by unit tests

use crate::error::{ShellError, ShellResult};
use crate::network::{Network, Request, Response};
use crate::store::{CacheEntry, CacheStore, MemoryCacheStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Network that answers from a fixed table and records every call
///
/// Unknown URLs get a 404. A held URL does not answer until released.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: HashMap<String, Result<Response, String>>,
    held: HashMap<String, Arc<Notify>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), Ok(Response::new(status, body)));
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.routes
            .insert(url.to_string(), Err("connection refused".to_string()));
        self
    }

    pub fn hold(mut self, url: &str) -> Self {
        self.held.insert(url.to_string(), Arc::new(Notify::new()));
        self
    }

    /// Let one held request for `url` answer
    pub fn release(&self, url: &str) {
        if let Some(gate) = self.held.get(url) {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> ShellResult<Response> {
        self.requested.lock().unwrap().push(request.url.clone());
        if let Some(gate) = self.held.get(&request.url) {
            gate.notified().await;
        }
        match self.routes.get(&request.url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(reason)) => Err(ShellError::network(&request.url, reason)),
            None => Ok(Response::new(404, "not found")),
        }
    }
}

/// Memory store that counts operations and can fail chosen deletes
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryCacheStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing_deletes: HashSet<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_delete(mut self, key: &str) -> Self {
        self.failing_deletes.insert(key.to_string());
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn get(&self, key: &str) -> ShellResult<Option<CacheEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, entry: CacheEntry) -> ShellResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(entry).await
    }

    async fn delete(&self, key: &str) -> ShellResult<bool> {
        if self.failing_deletes.contains(key) {
            return Err(ShellError::cache_store(key, "permission denied"));
        }
        self.inner.delete(key).await
    }

    async fn keys(&self) -> ShellResult<Vec<String>> {
        self.inner.keys().await
    }

    fn store_name(&self) -> &str {
        "recording"
    }
}
