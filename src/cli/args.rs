//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// trellis-shell - offline precache worker for browser application shells
///
/// Generates precache manifests, installs them into a persistent response
/// cache and serves requests cache-first the way the page's background
/// worker does.
#[derive(Parser, Debug)]
#[command(name = "trellis-shell")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache store root (overrides cache.dir)
    #[arg(long, global = true, env = "TRELLIS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a precache manifest from a build output directory
    Manifest(ManifestArgs),

    /// Install and activate a precache manifest
    Precache(PrecacheArgs),

    /// Route one request through the worker
    Fetch(FetchArgs),

    /// Inspect or clear the cache store
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the manifest command
#[derive(Parser, Debug)]
pub struct ManifestArgs {
    /// Build output directory
    pub dist: PathBuf,

    /// URL prefix prepended to every file path
    #[arg(long, default_value = "/")]
    pub prefix: String,

    /// Skip files ending with these suffixes (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Write the manifest here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the precache command
#[derive(Parser, Debug)]
pub struct PrecacheArgs {
    /// Precache manifest (JSON)
    pub manifest: PathBuf,

    /// Registration scope (default: bootstrap.scope)
    #[arg(long)]
    pub scope: Option<String>,

    /// Fail the install on the first failed asset (overrides worker.install_policy)
    #[arg(long, conflicts_with = "best_effort")]
    pub strict: bool,

    /// Skip assets that fail to download (overrides worker.install_policy)
    #[arg(long)]
    pub best_effort: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Request URL, absolute or relative to network.origin
    pub url: String,

    /// Precache manifest the worker was installed from
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Registration scope whose cache serves the request (default: bootstrap.scope)
    #[arg(long)]
    pub scope: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the response body to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for cache listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one key per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,

    /// Registration scope whose cache to use (default: bootstrap.scope)
    #[arg(long, global = true)]
    pub scope: Option<String>,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List stored entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every stored entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
