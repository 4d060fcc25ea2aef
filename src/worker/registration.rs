//! Host-side lifecycle driver for one scope
//!
//! A [`Registration`] owns the worker generations of a single scope: at
//! most one waiting (installed) and one active. It dispatches lifecycle
//! events to the controller, settles them, and applies the resulting state
//! transitions. A generation that becomes redundant is dropped and never
//! reused.
//!
//! Lifecycle changes are serialized per scope, but the worker slots are
//! only locked long enough to read or swap them. A fetch dispatched while
//! a new generation installs goes to the active worker without waiting.

use crate::error::{ShellError, ShellResult};
use crate::journal::{Journal, Transition};
use crate::network::{Network, Request};
use crate::worker::controller::WorkerController;
use crate::worker::event::{ExtendableEvent, FetchEvent, LifecycleEvent, Served};
use crate::worker::state::WorkerState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One worker generation as seen by the host
#[derive(Clone)]
pub struct WorkerHandle {
    id: Uuid,
    state: WorkerState,
    controller: WorkerController,
    created_at: DateTime<Utc>,
}

impl WorkerHandle {
    fn new(controller: WorkerController) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WorkerState::Installing,
            controller,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Manifest fingerprint this worker serves
    pub fn generation(&self) -> &str {
        self.controller.generation()
    }

    pub fn controller(&self) -> &WorkerController {
        &self.controller
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn transition(&mut self, next: WorkerState) -> ShellResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ShellError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("Worker {} {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Result of [`Registration::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The current generation already serves this manifest
    Unchanged { id: Uuid },
    /// A new generation was installed and activated
    Updated { id: Uuid },
}

impl UpdateOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Unchanged { id } | Self::Updated { id } => *id,
        }
    }
}

#[derive(Default)]
struct Slots {
    waiting: Option<WorkerHandle>,
    active: Option<WorkerHandle>,
}

/// Worker generations registered for one scope
pub struct Registration {
    scope: String,
    slots: RwLock<Slots>,
    lifecycle: Mutex<()>,
    network: Arc<dyn Network>,
    journal: Option<Journal>,
}

impl Registration {
    pub fn new(scope: impl Into<String>, network: Arc<dyn Network>) -> Self {
        Self {
            scope: scope.into(),
            slots: RwLock::new(Slots::default()),
            lifecycle: Mutex::new(()),
            network,
            journal: None,
        }
    }

    /// Record every transition to `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Snapshot of the worker currently controlling fetches
    pub async fn active(&self) -> Option<WorkerHandle> {
        self.slots.read().await.active.clone()
    }

    /// Snapshot of the installed worker waiting to activate
    pub async fn waiting(&self) -> Option<WorkerHandle> {
        self.slots.read().await.waiting.clone()
    }

    /// Whether fetches are currently intercepted
    pub async fn is_controlled(&self) -> bool {
        self.controlling().await.is_some()
    }

    async fn controlling(&self) -> Option<WorkerController> {
        self.slots
            .read()
            .await
            .active
            .as_ref()
            .filter(|w| w.state.can_intercept_fetch())
            .map(|w| w.controller.clone())
    }

    /// Run the install phase for a new generation
    ///
    /// On success the worker becomes the waiting worker, replacing any
    /// previous waiting one. On failure it becomes redundant and the active
    /// worker keeps serving.
    pub async fn install(&self, controller: WorkerController) -> ShellResult<Uuid> {
        let _lifecycle = self.lifecycle.lock().await;
        self.install_locked(controller).await
    }

    /// Promote the waiting worker
    ///
    /// The previous active worker becomes redundant first. Cleanup errors
    /// during the activate phase are logged and do not block activation.
    pub async fn activate(&self) -> ShellResult<Uuid> {
        let _lifecycle = self.lifecycle.lock().await;
        self.activate_locked().await
    }

    /// Install and activate `controller` unless its generation is current
    pub async fn update(&self, controller: WorkerController) -> ShellResult<UpdateOutcome> {
        let _lifecycle = self.lifecycle.lock().await;

        let (active, waiting) = {
            let slots = self.slots.read().await;
            (
                slots.active.as_ref().map(|w| (w.id, w.generation().to_string())),
                slots.waiting.as_ref().map(|w| w.generation().to_string()),
            )
        };

        if let Some((id, generation)) = active.filter(|(_, g)| g == controller.generation()) {
            debug!("Generation {} already active", generation);
            return Ok(UpdateOutcome::Unchanged { id });
        }

        if waiting.as_deref() != Some(controller.generation()) {
            self.install_locked(controller).await?;
        }
        let id = self.activate_locked().await?;
        Ok(UpdateOutcome::Updated { id })
    }

    async fn install_locked(&self, controller: WorkerController) -> ShellResult<Uuid> {
        let mut worker = WorkerHandle::new(controller);
        self.record(&worker).await;

        let mut event = ExtendableEvent::new(LifecycleEvent::Install);
        worker.controller.on_install(&mut event);

        if let Err(e) = event.settle().await {
            warn!("Install of worker {} failed: {}", worker.id, e);
            worker.transition(WorkerState::Redundant)?;
            self.record(&worker).await;
            return Err(e);
        }

        worker.transition(WorkerState::Installed)?;
        info!(
            "Worker {} installed for scope {} (generation {})",
            worker.id,
            self.scope,
            worker.generation()
        );
        self.record(&worker).await;

        let id = worker.id;
        let replaced = self.slots.write().await.waiting.replace(worker);
        if let Some(mut previous) = replaced {
            previous.transition(WorkerState::Redundant)?;
            self.record(&previous).await;
        }
        Ok(id)
    }

    async fn activate_locked(&self) -> ShellResult<Uuid> {
        let (mut worker, superseded) = {
            let mut slots = self.slots.write().await;
            let worker = slots.waiting.take().ok_or(ShellError::NothingToActivate)?;
            (worker, slots.active.take())
        };

        if let Some(mut previous) = superseded {
            previous.transition(WorkerState::Redundant)?;
            info!("Worker {} superseded by {}", previous.id, worker.id);
            self.record(&previous).await;
        }

        worker.transition(WorkerState::Activating)?;
        self.record(&worker).await;

        let mut event = ExtendableEvent::new(LifecycleEvent::Activate);
        worker.controller.on_activate(&mut event);
        if let Err(e) = event.settle().await {
            warn!("Activate cleanup for worker {} failed: {}", worker.id, e);
        }

        worker.transition(WorkerState::Activated)?;
        info!("Worker {} now controls scope {}", worker.id, self.scope);
        self.record(&worker).await;

        let id = worker.id;
        self.slots.write().await.active = Some(worker);
        Ok(id)
    }

    /// Dispatch a request the way the host would
    ///
    /// With an activated worker the request goes through its fetch handler;
    /// otherwise it is an uncontrolled network fetch.
    pub async fn fetch(&self, request: Request) -> ShellResult<Served> {
        let mut event = FetchEvent::new(request);
        if let Some(controller) = self.controlling().await {
            controller.on_fetch(&mut event)?;
        }
        event.into_response(self.network.as_ref()).await
    }

    /// Retire every generation; returns whether anything was registered
    pub async fn unregister(&self) -> ShellResult<bool> {
        let _lifecycle = self.lifecycle.lock().await;
        let retiring = {
            let mut slots = self.slots.write().await;
            [slots.waiting.take(), slots.active.take()]
        };

        let mut retired = false;
        for mut worker in retiring.into_iter().flatten() {
            worker.transition(WorkerState::Redundant)?;
            self.record(&worker).await;
            retired = true;
        }
        Ok(retired)
    }

    async fn record(&self, worker: &WorkerHandle) {
        if let Some(journal) = &self.journal {
            journal
                .record(&Transition::new(
                    &self.scope,
                    worker.id,
                    worker.generation(),
                    worker.state,
                ))
                .await;
        }
    }
}
