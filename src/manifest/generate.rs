//! Manifest generation from a build output directory
//!
//! Files whose names already carry a content hash (`app.4c1d9e2f.wasm`)
//! are self-versioning and get no revision. Every other file gets the
//! first 12 hex chars of the SHA256 of its contents.

use crate::error::{ShellError, ShellResult};
use crate::manifest::entry::{PrecacheEntry, PrecacheManifest};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Minimum length of a hex run treated as a content hash
const HASH_SEGMENT_MIN_LEN: usize = 8;

/// Options for [`generate_manifest`]
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Prefix prepended to every relative path (usually "/")
    pub url_prefix: String,
    /// File name suffixes to leave out (e.g. ".map")
    pub exclude_suffixes: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            url_prefix: "/".to_string(),
            exclude_suffixes: vec![".map".to_string(), ".LICENSE.txt".to_string()],
        }
    }
}

/// Whether a file name embeds a content hash
pub fn is_content_hashed(file_name: &str) -> bool {
    let mut segments: Vec<&str> = file_name.split(['.', '-', '_']).collect();
    // The extension is never the hash
    segments.pop();
    segments.iter().any(|s| {
        s.len() >= HASH_SEGMENT_MIN_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Hash file contents using SHA256, returning first 12 hex chars
fn content_revision(path: &Path) -> ShellResult<String> {
    let contents = fs::read(path).map_err(|e| ShellError::Io {
        context: format!("reading build output {}", path.display()),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode(&hasher.finalize()[..6]))
}

/// Collect regular files below `dir`, sorted for deterministic output
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> ShellResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ShellError::io(format!("reading directory {}", dir.display()), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ShellError::io("reading directory entry", e))?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Generate a precache manifest for every file under `dist_dir`
pub fn generate_manifest(dist_dir: &Path, options: &GenerateOptions) -> ShellResult<PrecacheManifest> {
    if !dist_dir.is_dir() {
        return Err(ShellError::PathNotFound(dist_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(dist_dir, &mut files)?;

    let prefix = if options.url_prefix.ends_with('/') {
        options.url_prefix.clone()
    } else {
        format!("{}/", options.url_prefix)
    };

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if options
            .exclude_suffixes
            .iter()
            .any(|suffix| file_name.ends_with(suffix.as_str()))
        {
            debug!("Excluding {}", path.display());
            continue;
        }

        let relative = path.strip_prefix(dist_dir).map_err(|_| ShellError::Internal(format!(
            "{} is not below {}",
            path.display(),
            dist_dir.display()
        )))?;
        let url_path: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let url = format!("{}{}", prefix, url_path.join("/"));

        let revision = if is_content_hashed(&file_name) {
            None
        } else {
            Some(content_revision(&path)?)
        };

        debug!("Precache {} (revision: {:?})", url, revision);
        entries.push(PrecacheEntry { url, revision });
    }

    PrecacheManifest::new(entries)
}
