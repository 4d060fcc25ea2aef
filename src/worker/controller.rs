//! Worker controller: install, activate and fetch handling
//!
//! The controller keeps the cache store consistent with one manifest
//! generation. It never changes its own lifecycle state; the host
//! ([`Registration`](crate::worker::Registration)) dispatches events and
//! decides transitions from the outcome.
//!
//! Entries are stored under [`PrecacheEntry::cache_key`], so a generation
//! being installed writes beside the active one instead of over it. The
//! superseded generation's keys go away when the new one activates.

use crate::config::schema::{InstallPolicy, WorkerConfig};
use crate::config::Config;
use crate::error::{ShellError, ShellResult};
use crate::manifest::{PrecacheEntry, PrecacheIndex, PrecacheManifest, UrlResolver};
use crate::network::{Network, Request, Response};
use crate::store::{CacheEntry, CacheStore};
use crate::worker::event::{ExtendableEvent, FetchEvent, Served};
use crate::worker::routing::{Route, Router};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a completed install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Assets downloaded and written
    pub fetched: Vec<String>,
    /// Assets already cached at the current revision
    pub reused: Vec<String>,
    /// Assets skipped after a failed download (best-effort policy only)
    pub skipped: Vec<String>,
}

/// Outcome of an activate cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale keys deleted
    pub removed: Vec<String>,
    /// Keys kept because the manifest still lists them
    pub retained: usize,
    /// Stale keys whose deletion failed
    pub failed: Vec<String>,
}

struct Inner {
    manifest: PrecacheManifest,
    generation: String,
    router: Router,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    settings: WorkerConfig,
}

/// Event handlers for one manifest generation
///
/// Cloning is cheap; clones share the same store and network.
#[derive(Clone)]
pub struct WorkerController {
    inner: Arc<Inner>,
}

impl WorkerController {
    /// Create a controller for `manifest`
    pub fn new(
        manifest: PrecacheManifest,
        resolver: UrlResolver,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        settings: WorkerConfig,
    ) -> ShellResult<Self> {
        let index = PrecacheIndex::new(&manifest, resolver)?;
        let generation = manifest.fingerprint();
        Ok(Self {
            inner: Arc::new(Inner {
                manifest,
                generation,
                router: Router::new(index),
                store,
                network,
                settings,
            }),
        })
    }

    /// Create a controller using the origin, routing and worker settings
    pub fn from_config(
        manifest: PrecacheManifest,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        config: &Config,
    ) -> ShellResult<Self> {
        let resolver = UrlResolver::new(&config.network.origin, &config.routing)?;
        Self::new(manifest, resolver, store, network, config.worker.clone())
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.inner.manifest
    }

    /// Fingerprint of the manifest this controller serves
    pub fn generation(&self) -> &str {
        &self.inner.generation
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.inner.store
    }

    /// Install handler: register the precache work with the event
    pub fn on_install(&self, event: &mut ExtendableEvent) {
        let this = self.clone();
        event.wait_until(async move {
            let report = this.install().await?;
            info!(
                "Precached {} asset(s), reused {}, skipped {}",
                report.fetched.len(),
                report.reused.len(),
                report.skipped.len()
            );
            Ok(())
        });
    }

    /// Activate handler: register stale-entry cleanup with the event
    pub fn on_activate(&self, event: &mut ExtendableEvent) {
        let this = self.clone();
        event.wait_until(async move {
            let report = this.activate().await;
            info!(
                "Removed {} stale entr(ies), retained {}",
                report.removed.len(),
                report.retained
            );
            Ok(())
        });
    }

    /// Fetch handler: claim the request with the routed strategy
    pub fn on_fetch(&self, event: &mut FetchEvent) -> ShellResult<()> {
        let this = self.clone();
        let request = event.request().clone();
        event.respond_with(async move { this.handle_fetch(request).await })
    }

    /// Populate the store from the manifest
    ///
    /// Entries already stored at the manifest revision are reused without
    /// a network call. Under [`InstallPolicy::Strict`] nothing is written
    /// unless every download succeeded.
    pub async fn install(&self) -> ShellResult<InstallReport> {
        let inner = &self.inner;
        let mut report = InstallReport::default();
        let mut to_fetch: Vec<PrecacheEntry> = Vec::new();

        for entry in inner.manifest.entries() {
            match inner.store.get(&entry.cache_key()).await {
                Ok(Some(cached)) if cached.matches_revision(entry.revision.as_deref()) => {
                    debug!("Reusing cached {} ({:?})", entry.url, entry.revision);
                    report.reused.push(entry.url.clone());
                }
                Ok(_) => to_fetch.push(entry.clone()),
                Err(e) => {
                    warn!("Cache read failed for {}, refetching: {}", entry.url, e);
                    to_fetch.push(entry.clone());
                }
            }
        }

        let concurrency = inner.settings.install_concurrency.max(1);
        let downloads: Vec<(PrecacheEntry, ShellResult<Response>)> = stream::iter(to_fetch)
            .map(|entry| {
                let network = inner.network.clone();
                async move {
                    let result = fetch_asset(network.as_ref(), &entry.url).await;
                    (entry, result)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut ready = Vec::with_capacity(downloads.len());
        let mut failures = Vec::new();
        for (entry, result) in downloads {
            match result {
                Ok(response) => ready.push((entry, response)),
                Err(e) => failures.push((entry, e)),
            }
        }

        if !failures.is_empty() {
            match inner.settings.install_policy {
                InstallPolicy::Strict => {
                    let failed = failures.len();
                    let (entry, source) = failures.remove(0);
                    warn!(
                        "Install aborted: {} asset(s) failed, first {}: {}",
                        failed, entry.url, source
                    );
                    return Err(ShellError::InstallFailed {
                        failed,
                        total: inner.manifest.len(),
                        first_url: entry.url,
                        source: Box::new(source),
                    });
                }
                InstallPolicy::BestEffort => {
                    for (entry, e) in failures {
                        warn!("Skipping precache of {}: {}", entry.url, e);
                        report.skipped.push(entry.url);
                    }
                }
            }
        }

        for (entry, response) in ready {
            let url = entry.url.clone();
            let write = inner
                .store
                .put(CacheEntry::new(entry.cache_key(), response, entry.revision))
                .await;
            match (write, inner.settings.install_policy) {
                (Ok(()), _) => report.fetched.push(url),
                (Err(e), InstallPolicy::Strict) => return Err(e),
                (Err(e), InstallPolicy::BestEffort) => {
                    warn!("Skipping precache of {}: {}", url, e);
                    report.skipped.push(url);
                }
            }
        }

        Ok(report)
    }

    /// Delete every stored entry that is not a key of this generation
    ///
    /// Never fails: a failed deletion is logged and left for the next
    /// activation to retry.
    pub async fn activate(&self) -> ActivateReport {
        let inner = &self.inner;
        let mut report = ActivateReport::default();
        let current = inner.manifest.cache_keys();

        let keys = match inner.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cannot list cache {}, skipping cleanup: {}", inner.store.store_name(), e);
                return report;
            }
        };

        for key in keys {
            if current.contains(&key) {
                report.retained += 1;
                continue;
            }
            match inner.store.delete(&key).await {
                Ok(_) => {
                    debug!("Removed stale entry {}", key);
                    report.removed.push(key);
                }
                Err(e) => {
                    warn!("Failed to remove stale entry {}: {}", key, e);
                    report.failed.push(key);
                }
            }
        }

        report
    }

    /// Satisfy one intercepted request
    ///
    /// Cache lookup strictly precedes the network fallback. Network errors
    /// reach the caller unchanged.
    pub async fn handle_fetch(&self, request: Request) -> ShellResult<Served> {
        let inner = &self.inner;
        let route = inner.router.route(&request);
        debug!("{} {} -> {}", request.method, request.url, route);

        let entry = match route {
            Route::PassThrough => {
                return inner.network.fetch(&request).await.map(Served::from_network);
            }
            Route::CacheFirst(entry) => entry,
        };

        let key = entry.cache_key();
        match inner.store.get(&key).await {
            Ok(Some(cached)) if cached.matches_revision(entry.revision.as_deref()) => {
                return Ok(Served::from_cache(cached.response));
            }
            Ok(Some(_)) => debug!("Cached {} is at a stale revision", entry.url),
            Ok(None) => debug!("Cache miss for precached {}", entry.url),
            Err(e) => warn!("Cache read failed for {}: {}", entry.url, e),
        }

        let response = inner.network.fetch(&request).await?;

        if inner.settings.repair_on_miss && response.is_ok() {
            // This generation's key only
            let repair = CacheEntry::new(key, response.clone(), entry.revision);
            if let Err(e) = inner.store.put(repair).await {
                warn!("Failed to repair cache entry {}: {}", entry.url, e);
            }
        }

        Ok(Served::from_network(response))
    }
}

/// Download one precache asset; non-2xx counts as a failure
async fn fetch_asset(network: &dyn Network, url: &str) -> ShellResult<Response> {
    let response = network.fetch(&Request::get(url)).await?;
    if !response.is_ok() {
        return Err(ShellError::BadResponse {
            url: url.to_string(),
            status: response.status,
        });
    }
    Ok(response)
}
