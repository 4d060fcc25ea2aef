//! Precache manifest parsing
//!
//! The build tool emits the manifest as a JSON array. Each element is
//! either `{ "url": ..., "revision": ... }` or a bare URL string for
//! content-addressed assets.

use crate::error::{ShellError, ShellResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Query parameter carrying the revision in a store key
pub const REVISION_PARAM: &str = "__trellis_revision";

/// One asset to cache ahead of use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheEntry {
    /// Asset URL, as written by the build tool
    pub url: String,

    /// Opaque version token; `None` when the URL itself is content-addressed
    #[serde(default)]
    pub revision: Option<String>,
}

impl PrecacheEntry {
    /// Create an entry
    pub fn new(url: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            url: url.into(),
            revision: revision.map(str::to_string),
        }
    }

    /// Whether the URL alone identifies the content
    pub fn is_self_versioned(&self) -> bool {
        self.revision.is_none()
    }

    /// Key this asset is stored under
    ///
    /// Revisioned assets carry the revision as a query parameter, so two
    /// generations of `/index.html` occupy different keys and installing a
    /// new generation never overwrites the one still serving.
    pub fn cache_key(&self) -> String {
        match &self.revision {
            None => self.url.clone(),
            Some(revision) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}{}={}", self.url, separator, REVISION_PARAM, revision)
            }
        }
    }
}

/// Wire format accepted from the build tool
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Url(String),
    Entry(PrecacheEntry),
}

impl From<RawEntry> for PrecacheEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Url(url) => PrecacheEntry { url, revision: None },
            RawEntry::Entry(entry) => entry,
        }
    }
}

/// One build's complete, ordered set of precached assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheManifest {
    entries: Vec<PrecacheEntry>,
}

impl PrecacheManifest {
    /// Build a manifest, rejecting duplicate URLs
    pub fn new(entries: Vec<PrecacheEntry>) -> ShellResult<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.url.trim().is_empty() {
                return Err(ShellError::ManifestInvalid {
                    source_name: "manifest".to_string(),
                    reason: "entry with empty url".to_string(),
                });
            }
            if !seen.insert(entry.url.as_str()) {
                return Err(ShellError::DuplicateManifestUrl(entry.url.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Parse a manifest from the build tool's JSON output
    pub fn from_json(content: &str) -> ShellResult<Self> {
        let raw: Vec<RawEntry> =
            serde_json::from_str(content).map_err(|e| ShellError::ManifestInvalid {
                source_name: "manifest".to_string(),
                reason: e.to_string(),
            })?;
        Self::new(raw.into_iter().map(PrecacheEntry::from).collect())
    }

    /// Parse a manifest from a JSON file on disk
    pub async fn from_file(path: &Path) -> ShellResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ShellError::io(format!("reading precache manifest {}", path.display()), e)
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ShellError::ManifestInvalid { reason, .. } => ShellError::ManifestInvalid {
                source_name: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Serialize as the build tool's JSON format
    pub fn to_json_pretty(&self) -> ShellResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Entries in build order
    pub fn entries(&self) -> &[PrecacheEntry] {
        &self.entries
    }

    /// Look up an entry by its manifest URL
    pub fn get(&self, url: &str) -> Option<&PrecacheEntry> {
        self.entries.iter().find(|e| e.url == url)
    }

    /// Whether the manifest lists this URL
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Store keys of every entry
    pub fn cache_keys(&self) -> HashSet<String> {
        self.entries.iter().map(PrecacheEntry::cache_key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content fingerprint of this generation (first 12 hex chars of SHA256)
    ///
    /// Two manifests with the same entries in the same order share a
    /// fingerprint, so re-registering an unchanged build is a no-op.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.url.as_bytes());
            hasher.update([0u8]);
            if let Some(ref revision) = entry.revision {
                hasher.update(revision.as_bytes());
            }
            hasher.update([0xffu8]);
        }
        hex::encode(&hasher.finalize()[..6])
    }
}
