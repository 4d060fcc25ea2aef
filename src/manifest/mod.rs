//! Precache manifest
//!
//! A manifest is one build's list of `(url, revision)` pairs. It is
//! generated once per build, embedded into the worker, and read once
//! during install. Revisions let install skip assets that are already
//! cached at the right version.

pub mod entry;
pub mod generate;
pub mod resolve;

pub use entry::{PrecacheEntry, PrecacheManifest};
pub use generate::{generate_manifest, is_content_hashed, GenerateOptions};
pub use resolve::{PrecacheIndex, UrlResolver};
