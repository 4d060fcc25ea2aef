//! Request-to-manifest URL resolution
//!
//! A request matches a precached asset when any of its URL variations
//! equals the asset's resolved URL. Variations, in order:
//!
//! 1. the request URL without its fragment
//! 2. the same URL with ignored query parameters removed
//! 3. the directory index appended, when the path ends in `/`
//! 4. `.html` appended, when clean URLs are enabled

use crate::config::schema::RoutingConfig;
use crate::error::{ShellError, ShellResult};
use crate::manifest::entry::{PrecacheEntry, PrecacheManifest};
use std::collections::HashMap;
use url::Url;

/// Query parameter name pattern: exact name, or `prefix*`
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamMatcher {
    Exact(String),
    Prefix(String),
}

impl ParamMatcher {
    fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Resolves URLs against the worker origin and expands request variations
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base: Url,
    ignore: Vec<ParamMatcher>,
    directory_index: Option<String>,
    clean_urls: bool,
}

impl UrlResolver {
    /// Create a resolver for the given origin
    pub fn new(origin: &str, routing: &RoutingConfig) -> ShellResult<Self> {
        let base = Url::parse(origin).map_err(|e| ShellError::InvalidUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            base,
            ignore: routing
                .ignore_url_parameters
                .iter()
                .map(|p| ParamMatcher::parse(p))
                .collect(),
            directory_index: routing.directory_index.clone().filter(|s| !s.is_empty()),
            clean_urls: routing.clean_urls,
        })
    }

    /// Resolve a possibly-relative URL to an absolute one, fragment removed
    pub fn resolve(&self, url: &str) -> ShellResult<Url> {
        let mut resolved = self.base.join(url).map_err(|e| ShellError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        resolved.set_fragment(None);
        Ok(resolved)
    }

    /// Candidate URLs a request may be precached under, most specific first
    pub fn variations(&self, url: &Url) -> Vec<String> {
        let mut out = Vec::with_capacity(4);
        let mut push = |candidate: String| {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        };

        let mut exact = url.clone();
        exact.set_fragment(None);
        push(exact.to_string());

        let stripped = self.strip_ignored_params(&exact);
        push(stripped.to_string());

        if let Some(ref index) = self.directory_index {
            if stripped.path().ends_with('/') {
                let mut with_index = stripped.clone();
                with_index.set_path(&format!("{}{}", stripped.path(), index));
                push(with_index.to_string());
            }
        }

        if self.clean_urls && !stripped.path().ends_with('/') {
            let mut with_html = stripped.clone();
            with_html.set_path(&format!("{}.html", stripped.path()));
            push(with_html.to_string());
        }

        out
    }

    fn strip_ignored_params(&self, url: &Url) -> Url {
        if url.query().is_none() || self.ignore.is_empty() {
            return url.clone();
        }

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !self.ignore.iter().any(|m| m.matches(name)))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        let mut stripped = url.clone();
        if kept.is_empty() {
            stripped.set_query(None);
        } else {
            stripped.query_pairs_mut().clear().extend_pairs(kept);
        }
        stripped
    }
}

/// Lookup table from resolved asset URL to manifest entry
#[derive(Debug, Clone)]
pub struct PrecacheIndex {
    resolver: UrlResolver,
    by_url: HashMap<String, PrecacheEntry>,
}

impl PrecacheIndex {
    /// Index every entry of a manifest
    pub fn new(manifest: &PrecacheManifest, resolver: UrlResolver) -> ShellResult<Self> {
        let mut by_url = HashMap::with_capacity(manifest.len());
        for entry in manifest.entries() {
            let resolved = resolver.resolve(&entry.url)?;
            if by_url.insert(resolved.to_string(), entry.clone()).is_some() {
                // Two spellings of the same asset ("/a" and "a")
                return Err(ShellError::DuplicateManifestUrl(entry.url.clone()));
            }
        }
        Ok(Self { resolver, by_url })
    }

    /// Find the manifest entry a request URL resolves to
    pub fn match_url(&self, url: &str) -> Option<&PrecacheEntry> {
        let resolved = self.resolver.resolve(url).ok()?;
        self.resolver
            .variations(&resolved)
            .iter()
            .find_map(|candidate| self.by_url.get(candidate))
    }

    /// The resolver used for matching
    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UrlResolver {
        UrlResolver::new("http://localhost:8000", &RoutingConfig::default()).unwrap()
    }

    fn index(urls: &[&str]) -> PrecacheIndex {
        let manifest = PrecacheManifest::new(
            urls.iter()
                .map(|u| PrecacheEntry::new(*u, Some("r1")))
                .collect(),
        )
        .unwrap();
        PrecacheIndex::new(&manifest, resolver()).unwrap()
    }

    #[test]
    fn param_matcher_prefix_and_exact() {
        assert!(ParamMatcher::parse("utm_*").matches("utm_source"));
        assert!(!ParamMatcher::parse("utm_*").matches("xutm_source"));
        assert!(ParamMatcher::parse("fbclid").matches("fbclid"));
        assert!(!ParamMatcher::parse("fbclid").matches("fbclid2"));
    }

    #[test]
    fn variations_strip_fragment_and_tracking_params() {
        let r = resolver();
        let url = r.resolve("/about?utm_source=mail&tab=2#top").unwrap();
        let variations = r.variations(&url);

        assert_eq!(variations[0], "http://localhost:8000/about?utm_source=mail&tab=2");
        assert_eq!(variations[1], "http://localhost:8000/about?tab=2");
        assert_eq!(variations[2], "http://localhost:8000/about.html?tab=2");
    }

    #[test]
    fn variations_add_directory_index() {
        let r = resolver();
        let url = r.resolve("/").unwrap();
        assert_eq!(
            r.variations(&url),
            vec![
                "http://localhost:8000/".to_string(),
                "http://localhost:8000/index.html".to_string(),
            ]
        );
    }

    #[test]
    fn variations_respect_disabled_options() {
        let routing = RoutingConfig {
            ignore_url_parameters: vec![],
            directory_index: None,
            clean_urls: false,
        };
        let r = UrlResolver::new("http://localhost:8000", &routing).unwrap();
        let url = r.resolve("/docs/?utm_source=x").unwrap();
        assert_eq!(
            r.variations(&url),
            vec!["http://localhost:8000/docs/?utm_source=x".to_string()]
        );
    }

    #[test]
    fn index_matches_exact_and_variant_urls() {
        let idx = index(&["/app.wasm", "/index.html", "/settings.html"]);

        assert_eq!(idx.match_url("/app.wasm").unwrap().url, "/app.wasm");
        assert_eq!(
            idx.match_url("http://localhost:8000/app.wasm").unwrap().url,
            "/app.wasm"
        );
        assert_eq!(idx.match_url("/app.wasm?fbclid=abc").unwrap().url, "/app.wasm");
        assert_eq!(idx.match_url("/").unwrap().url, "/index.html");
        assert_eq!(idx.match_url("/settings").unwrap().url, "/settings.html");
    }

    #[test]
    fn index_ignores_other_urls() {
        let idx = index(&["/app.wasm"]);

        assert!(idx.match_url("/api/data").is_none());
        assert!(idx.match_url("/app.wasm?v=2").is_none());
        assert!(idx.match_url("https://cdn.example.com/app.wasm").is_none());
    }

    #[test]
    fn index_rejects_two_spellings_of_one_asset() {
        let manifest = PrecacheManifest::new(vec![
            PrecacheEntry::new("/app.wasm", None),
            PrecacheEntry::new("app.wasm", None),
        ])
        .unwrap();
        assert!(matches!(
            PrecacheIndex::new(&manifest, resolver()),
            Err(ShellError::DuplicateManifestUrl(_))
        ));
    }
}
