//! trellis-shell - offline precache worker and page bootstrap
//!
//! Models the background worker of a browser application shell: a precache
//! manifest is installed into a persistent response cache, stale entries
//! are removed on activation and requests for precached assets are served
//! cache-first. The bootstrap loader registers the worker after page load
//! without delaying the application module.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod journal;
pub mod manifest;
pub mod network;
pub mod store;
pub mod ui;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use error::{ShellError, ShellResult};
