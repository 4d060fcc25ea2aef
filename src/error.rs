//! Error types for trellis-shell
//!
//! All modules use `ShellResult<T>` as their return type.

use crate::worker::WorkerState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shell operations
pub type ShellResult<T> = Result<T, ShellError>;

/// All errors that can occur in the shell
#[derive(Error, Debug)]
pub enum ShellError {
    // Manifest errors
    #[error("Invalid precache manifest {source_name}: {reason}")]
    ManifestInvalid { source_name: String, reason: String },

    #[error("Duplicate URL in precache manifest: {0}")]
    DuplicateManifestUrl(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // Network errors
    #[error("Network request failed: {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Bad response for {url}: HTTP {status}")]
    BadResponse { url: String, status: u16 },

    // Cache store errors
    #[error("Cache store error for {key}: {reason}")]
    CacheStore { key: String, reason: String },

    // Worker lifecycle errors
    #[error("Install failed: {failed} of {total} precache asset(s) could not be fetched (first: {first_url})")]
    InstallFailed {
        failed: usize,
        total: usize,
        first_url: String,
        #[source]
        source: Box<ShellError>,
    },

    #[error("Invalid worker state transition: {from} -> {to}")]
    InvalidTransition { from: WorkerState, to: WorkerState },

    #[error("No installed worker waiting to activate")]
    NothingToActivate,

    #[error("Fetch event already has a response")]
    AlreadyResponded,

    // Registration errors
    #[error("Scope {scope} is outside of script directory {script}")]
    ScopeOutsideScript { scope: String, script: String },

    // Application module errors
    #[error("Application module failed: {0}")]
    App(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a cache store error for a key
    pub fn cache_store(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CacheStore {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::BadResponse { status, .. } => *status >= 500,
            Self::InstallFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { .. } => Some("Check that network.origin in the config points at a running server"),
            Self::InstallFailed { .. } => {
                Some("Fix the failing asset or set worker.install_policy = \"best-effort\"")
            }
            Self::DuplicateManifestUrl(_) => Some("Regenerate the manifest: each URL may appear once"),
            Self::ScopeOutsideScript { .. } => {
                Some("Move the worker script up, or narrow bootstrap.scope")
            }
            _ => None,
        }
    }
}
