//! Configuration schema for trellis-shell
//!
//! Configuration is stored at `~/.config/trellis-shell/config.toml`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Background worker settings
    pub worker: WorkerConfig,

    /// Request-to-manifest matching
    pub routing: RoutingConfig,

    /// Network transport settings
    pub network: NetworkConfig,

    /// On-disk cache store settings
    pub cache: CacheConfig,

    /// Page bootstrap settings
    pub bootstrap: BootstrapConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Record worker lifecycle transitions to the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// What install does when a precache asset cannot be fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    /// Any failed asset fails the whole install; nothing is written
    #[default]
    Strict,
    /// Failed assets are logged and skipped
    BestEffort,
}

impl fmt::Display for InstallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Background worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache namespace owned by the worker
    pub cache_name: String,

    /// Install failure policy
    pub install_policy: InstallPolicy,

    /// Maximum concurrent precache downloads during install
    pub install_concurrency: usize,

    /// Write precached assets back to the store after a cache miss
    pub repair_on_miss: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "trellis-precache-v1".to_string(),
            install_policy: InstallPolicy::Strict,
            install_concurrency: 6,
            repair_on_miss: true,
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Query parameters ignored when matching requests (`name` or `prefix*`)
    pub ignore_url_parameters: Vec<String>,

    /// File appended to request paths ending in `/`
    pub directory_index: Option<String>,

    /// Try `<path>.html` for extensionless requests
    pub clean_urls: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            ignore_url_parameters: vec!["utm_*".to_string(), "fbclid".to_string()],
            directory_index: Some("index.html".to_string()),
            clean_urls: true,
        }
    }
}

/// Network transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Origin that relative URLs resolve against
    pub origin: String,

    /// Whole-request timeout in seconds (0 = transport default)
    pub timeout_secs: u64,

    /// Largest response body accepted, in MB
    pub max_body_mb: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            max_body_mb: 64,
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory (defaults to the state directory)
    pub dir: Option<PathBuf>,
}

/// Page bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Worker script URL to register
    pub script_url: String,

    /// Registration scope
    pub scope: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            script_url: "/service_worker.js".to_string(),
            scope: "/".to_string(),
        }
    }
}
