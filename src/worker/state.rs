//! Worker lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-managed lifecycle state of one worker generation
///
/// ```text
/// installing ──ok──▶ installed ──▶ activating ──▶ activated
///      │                 │                            │
///      └──fail──▶ redundant ◀──────superseded─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Install event dispatched, precache in progress
    Installing,
    /// Precache complete, waiting to take over
    Installed,
    /// Activate event dispatched, stale entries being removed
    Activating,
    /// Controlling fetches for its scope
    Activated,
    /// Failed to install or replaced by a newer generation
    Redundant,
}

impl WorkerState {
    /// Whether the host may move a worker from `self` to `next`
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Installed, Redundant)
                | (Activating, Activated)
                | (Activated, Redundant)
        )
    }

    /// Only an activated worker intercepts fetches
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, Self::Activated)
    }

    /// Redundant workers never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}
