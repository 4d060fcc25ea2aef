//! Worker containers
//!
//! A container is the page's entry point for registering a worker script
//! under a scope. [`InProcessContainer`] plays the host's part inside this
//! process: it downloads the script (the precache manifest), builds a
//! controller over the scope's own cache namespace and drives the scope's
//! [`Registration`].
//!
//! The registration map is locked only to look up or insert a scope.
//! Installs and fetches run on the scope's [`Registration`] outside it.

use crate::config::Config;
use crate::error::{ShellError, ShellResult};
use crate::journal::Journal;
use crate::manifest::PrecacheManifest;
use crate::network::{Network, Request};
use crate::store::{scope_namespace, CacheStorage};
use crate::worker::{Registration, Served, UpdateOutcome, WorkerController};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// What a successful registration produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInfo {
    pub script_url: String,
    pub scope: String,
    /// Worker now controlling the scope
    pub worker_id: Uuid,
    /// Whether a new generation was installed
    pub updated: bool,
}

/// Host facility that registers worker scripts
#[async_trait]
pub trait ServiceWorkerContainer: Send + Sync {
    /// Whether this host can run background workers at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Register `script_url` to control `scope`
    async fn register(&self, script_url: &str, scope: &str) -> ShellResult<RegistrationInfo>;

    /// Human-readable container name for display
    fn container_name(&self) -> &'static str;
}

/// Container that runs workers in the current process
pub struct InProcessContainer {
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
    config: Config,
    origin: Url,
    journal: Option<Journal>,
    registrations: Mutex<BTreeMap<String, Arc<Registration>>>,
}

impl InProcessContainer {
    pub fn new(
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
        config: Config,
    ) -> ShellResult<Self> {
        let origin = Url::parse(&config.network.origin).map_err(|e| ShellError::InvalidUrl {
            url: config.network.origin.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            network,
            storage,
            config,
            origin,
            journal: None,
            registrations: Mutex::new(BTreeMap::new()),
        })
    }

    /// Journal transitions of every registration this container creates
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Scopes that currently have a registration
    pub async fn scopes(&self) -> Vec<String> {
        self.registrations.lock().await.keys().cloned().collect()
    }

    /// Dispatch a request through the registration whose scope is the
    /// longest prefix of its path, or straight to the network
    pub async fn fetch(&self, request: Request) -> ShellResult<Served> {
        let path = self.absolute(&request.url)?.path().to_string();
        let controlling = self
            .registrations
            .lock()
            .await
            .iter()
            .filter(|(scope, _)| path.starts_with(scope.as_str()))
            .max_by_key(|(scope, _)| scope.len())
            .map(|(_, registration)| registration.clone());

        match controlling {
            Some(registration) => {
                debug!("{} is in scope {}", request.url, registration.scope());
                registration.fetch(request).await
            }
            None => self
                .network
                .fetch(&request)
                .await
                .map(Served::from_network),
        }
    }

    fn absolute(&self, url: &str) -> ShellResult<Url> {
        self.origin.join(url).map_err(|e| ShellError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve `scope` and check it lies within the script's directory
    fn validate_scope(&self, script_url: &str, scope: &str) -> ShellResult<String> {
        let script = self.absolute(script_url)?;
        let scope_url = self.absolute(scope)?;

        let script_path = script.path();
        let script_dir = &script_path[..script_path.rfind('/').map_or(0, |i| i + 1)];

        if scope_url.origin() != script.origin() || !scope_url.path().starts_with(script_dir) {
            return Err(ShellError::ScopeOutsideScript {
                scope: scope.to_string(),
                script: script_url.to_string(),
            });
        }
        Ok(scope_url.path().to_string())
    }

    /// Drop a registration whose first install failed
    async fn discard_if_empty(&self, scope: &str, registration: &Arc<Registration>) {
        if registration.active().await.is_some() || registration.waiting().await.is_some() {
            return;
        }
        let mut registrations = self.registrations.lock().await;
        if registrations
            .get(scope)
            .is_some_and(|current| Arc::ptr_eq(current, registration))
        {
            registrations.remove(scope);
        }
    }

    async fn load_manifest(&self, script_url: &str) -> ShellResult<PrecacheManifest> {
        let response = self.network.fetch(&Request::get(script_url)).await?;
        if !response.is_ok() {
            return Err(ShellError::BadResponse {
                url: script_url.to_string(),
                status: response.status,
            });
        }
        let content = String::from_utf8(response.body).map_err(|e| ShellError::ManifestInvalid {
            source_name: script_url.to_string(),
            reason: e.to_string(),
        })?;
        PrecacheManifest::from_json(&content).map_err(|e| match e {
            ShellError::ManifestInvalid { reason, .. } => ShellError::ManifestInvalid {
                source_name: script_url.to_string(),
                reason,
            },
            other => other,
        })
    }
}

#[async_trait]
impl ServiceWorkerContainer for InProcessContainer {
    async fn register(&self, script_url: &str, scope: &str) -> ShellResult<RegistrationInfo> {
        let scope = self.validate_scope(script_url, scope)?;
        let manifest = self.load_manifest(script_url).await?;
        debug!(
            "Loaded {} precache entr(ies) from {}",
            manifest.len(),
            script_url
        );

        let namespace = scope_namespace(&self.config.worker.cache_name, &scope);
        let store = self.storage.open(&namespace).await?;
        let controller =
            WorkerController::from_config(manifest, store, self.network.clone(), &self.config)?;

        let registration = self
            .registrations
            .lock()
            .await
            .entry(scope.clone())
            .or_insert_with(|| {
                let registration = Registration::new(scope.clone(), self.network.clone());
                Arc::new(match &self.journal {
                    Some(journal) => registration.with_journal(journal.clone()),
                    None => registration,
                })
            })
            .clone();

        let outcome = match registration.update(controller).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard_if_empty(&scope, &registration).await;
                return Err(e);
            }
        };
        info!("Registered {} for scope {}", script_url, scope);

        Ok(RegistrationInfo {
            script_url: script_url.to_string(),
            scope,
            worker_id: outcome.id(),
            updated: matches!(outcome, UpdateOutcome::Updated { .. }),
        })
    }

    fn container_name(&self) -> &'static str {
        "in-process"
    }
}
