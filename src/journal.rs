//! Lifecycle journal
//!
//! Every worker transition becomes one [`Transition`] line in
//! `<state dir>/journal.log`. Reading the file back in order shows which
//! generation controlled a scope at any point.

use crate::config::{schema::Config, ConfigManager};
use crate::worker::WorkerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// One journaled worker transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub at: DateTime<Utc>,
    /// `worker.<state>`
    pub event: String,
    pub scope: String,
    pub worker: Uuid,
    /// Manifest fingerprint the worker serves
    pub generation: String,
    pub state: WorkerState,
}

impl Transition {
    pub fn new(scope: &str, worker: Uuid, generation: &str, state: WorkerState) -> Self {
        Self {
            at: Utc::now(),
            event: format!("worker.{}", state),
            scope: scope.to_string(),
            worker,
            generation: generation.to_string(),
            state,
        }
    }
}

/// Append-only transition log; `None` path means disabled
#[derive(Debug, Clone)]
pub struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    /// Journal under the state directory, unless `general.journal` is off
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.general.journal.then(ConfigManager::journal_path),
        }
    }

    /// Journal writing to an explicit file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a transition
    ///
    /// Failures are logged and dropped; the lifecycle step still completes.
    pub async fn record(&self, transition: &Transition) {
        let Some(path) = &self.path else {
            return;
        };

        let line = match serde_json::to_string(transition) {
            Ok(json) => json + "\n",
            Err(e) => {
                warn!("Failed to encode {} for the journal: {}", transition.event, e);
                return;
            }
        };

        if let Err(e) = append_line(path, &line).await {
            warn!("Failed to write journal {}: {}", path.display(), e);
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
