//! Per-request strategy selection

use crate::manifest::{PrecacheEntry, PrecacheIndex};
use crate::network::{Method, Request};
use std::fmt;

/// How a single intercepted request is satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Precached asset: store first, network only on a miss
    CacheFirst(PrecacheEntry),
    /// Anything else: straight to the network, store untouched
    PassThrough,
}

impl Route {
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Self::CacheFirst(_) => "cache-first",
            Self::PassThrough => "network-pass-through",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy_name())
    }
}

/// Classifies requests against the precache index
#[derive(Debug, Clone)]
pub struct Router {
    index: PrecacheIndex,
}

impl Router {
    pub fn new(index: PrecacheIndex) -> Self {
        Self { index }
    }

    /// Pick the strategy for a request
    ///
    /// Only GET requests for a precached URL are cache-first.
    pub fn route(&self, request: &Request) -> Route {
        if request.method != Method::Get {
            return Route::PassThrough;
        }
        match self.index.match_url(&request.url) {
            Some(entry) => Route::CacheFirst(entry.clone()),
            None => Route::PassThrough,
        }
    }
}
