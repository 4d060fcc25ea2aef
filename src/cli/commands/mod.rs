//! CLI command implementations

pub mod cache;
pub mod config;
pub mod fetch;
pub mod manifest;
pub mod precache;

pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use manifest::execute as manifest;
pub use precache::execute as precache;

use crate::config::{Config, ConfigManager};
use crate::error::ShellResult;
use crate::store::{scope_namespace, DiskCacheStorage, DiskCacheStore};
use std::sync::Arc;

/// Open the cache namespace of `scope` under the cache root
pub(crate) async fn open_store(config: &Config, scope: &str) -> ShellResult<Arc<DiskCacheStore>> {
    let storage = DiskCacheStorage::new(ConfigManager::cache_root(config));
    let store = storage
        .namespace(&scope_namespace(&config.worker.cache_name, scope))
        .await?;
    Ok(Arc::new(store))
}
