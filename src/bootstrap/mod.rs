//! Page bootstrap sequencing
//!
//! Two independent jobs start when the page boots:
//!
//! 1. If a worker container is available, a background task waits for the
//!    page load signal and registers the worker script.
//! 2. The application module runs immediately.
//!
//! Neither waits for the other. A registration failure is logged and
//! reported through [`BootHandle`], never raised to the application.

mod container;

pub use container::{InProcessContainer, RegistrationInfo, ServiceWorkerContainer};

use crate::config::schema::BootstrapConfig;
use crate::error::ShellResult;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The compiled application module's entry point
pub trait AppModule {
    fn run(&mut self) -> ShellResult<()>;
}

impl<F> AppModule for F
where
    F: FnMut() -> ShellResult<()>,
{
    fn run(&mut self) -> ShellResult<()> {
        self()
    }
}

/// Fires the page load signal
pub struct PageLoadTrigger(watch::Sender<bool>);

impl PageLoadTrigger {
    pub fn fire(&self) {
        self.0.send_replace(true);
    }
}

/// Awaitable page load signal
#[derive(Clone)]
pub struct PageLoad(watch::Receiver<bool>);

impl PageLoad {
    /// A signal not yet fired, plus its trigger
    pub fn pending() -> (PageLoadTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (PageLoadTrigger(tx), Self(rx))
    }

    /// A signal that has already fired
    pub fn loaded() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self(rx)
    }

    /// Wait for the load signal; false if the trigger was dropped first
    pub async fn wait(mut self) -> bool {
        self.0.wait_for(|loaded| *loaded).await.is_ok()
    }
}

/// How the background registration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(RegistrationInfo),
    Failed(String),
    /// No worker container on this host
    Unsupported,
}

impl fmt::Display for RegistrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered(info) => write!(f, "registered for scope {}", info.scope),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Result of [`BootstrapLoader::boot`]
pub struct BootHandle {
    /// What the application module returned
    pub app_result: ShellResult<()>,
    registration: Option<JoinHandle<RegistrationOutcome>>,
}

impl BootHandle {
    /// Whether a registration task was started
    pub fn registration_started(&self) -> bool {
        self.registration.is_some()
    }

    /// Wait for the background registration to finish
    pub async fn registration(&mut self) -> RegistrationOutcome {
        match self.registration.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|e| RegistrationOutcome::Failed(format!("registration task aborted: {}", e))),
            None => RegistrationOutcome::Unsupported,
        }
    }
}

/// Sequences worker registration and application startup
pub struct BootstrapLoader {
    settings: BootstrapConfig,
    container: Option<Arc<dyn ServiceWorkerContainer>>,
}

impl BootstrapLoader {
    pub fn new(settings: BootstrapConfig, container: Option<Arc<dyn ServiceWorkerContainer>>) -> Self {
        Self {
            settings,
            container,
        }
    }

    /// Start registration in the background, then run the module
    ///
    /// Must be called from within a Tokio runtime.
    pub fn boot<M>(&self, load: PageLoad, module: &mut M) -> BootHandle
    where
        M: AppModule + ?Sized,
    {
        let registration = self.spawn_registration(load);

        let app_result = module.run();
        if let Err(e) = &app_result {
            error!("Application module failed: {}", e);
        }

        BootHandle {
            app_result,
            registration,
        }
    }

    fn spawn_registration(&self, load: PageLoad) -> Option<JoinHandle<RegistrationOutcome>> {
        let Some(container) = self.container.clone().filter(|c| c.is_supported()) else {
            info!("Background workers unsupported, skipping registration");
            return None;
        };

        let script_url = self.settings.script_url.clone();
        let scope = self.settings.scope.clone();

        Some(tokio::spawn(async move {
            if !load.wait().await {
                warn!("Page unloaded before load, {} not registered", script_url);
                return RegistrationOutcome::Failed("page unloaded before load signal".to_string());
            }

            match container.register(&script_url, &scope).await {
                Ok(info) => {
                    info!(
                        "Worker registered with {} for scope {}",
                        container.container_name(),
                        info.scope
                    );
                    RegistrationOutcome::Registered(info)
                }
                Err(e) => {
                    error!("Worker registration failed: {}", e);
                    RegistrationOutcome::Failed(e.to_string())
                }
            }
        }))
    }
}
