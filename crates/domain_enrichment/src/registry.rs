//! Registry of lookup caches, for startup loads and change-data refreshes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::LookupCache;
use crate::error::LookupError;
use crate::notifications::RefreshNotification;

#[derive(Default)]
pub struct LookupRegistry {
    caches: HashMap<String, Arc<LookupCache>>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cache: Arc<LookupCache>) {
        self.caches.insert(cache.name().to_string(), cache);
    }

    pub fn cache(&self, name: &str) -> Option<Arc<LookupCache>> {
        self.caches.get(name).cloned()
    }

    /// Bulk-loads every registered cache. Lazy caches fill on demand and are
    /// skipped here.
    pub async fn refresh_all(&self) -> Result<(), LookupError> {
        for cache in self.caches.values() {
            if cache.is_lazy() {
                continue;
            }
            let rows = cache.refresh().await?;
            info!(cache = cache.name(), rows, "lookup cache loaded");
        }
        Ok(())
    }

    /// Applies one refresh notification. Returns the number of rows reloaded.
    pub async fn apply(&self, notification: &RefreshNotification) -> Result<usize, LookupError> {
        let Some(cache) = self.cache(&notification.cache) else {
            warn!(cache = %notification.cache, "refresh for unknown cache");
            return Err(LookupError::UnknownCache(notification.cache.clone()));
        };
        let params = notification.params();
        if params.is_empty() {
            cache.refresh().await
        } else {
            cache.refresh_where(&params).await
        }
    }
}
