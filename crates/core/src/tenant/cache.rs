use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{FileTenantLoader, TenantError, TenantId, TenantLoader, TenantProfile};

struct CacheEntry {
    profile: Arc<TenantProfile>,
    loaded_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(true, |ttl| self.loaded_at.elapsed() < ttl)
    }
}

/// Loaded tenant profiles keyed by tenant id.
///
/// Owned by whoever serves requests; nothing here is global. A TTL makes
/// entries older than the TTL reload on their next lookup.
pub struct TenantCache<L = FileTenantLoader> {
    loader: L,
    ttl: Option<Duration>,
    entries: RwLock<HashMap<TenantId, CacheEntry>>,
}

impl<L: TenantLoader> TenantCache<L> {
    pub fn new(loader: L) -> Self {
        Self { loader, ttl: None, entries: RwLock::new(HashMap::new()) }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Lookups are keyed by the loader's cache key, so every tenant that
    /// falls back to the default profile shares one entry.
    pub fn get_or_load(&self, tenant_id: &TenantId) -> Result<Arc<TenantProfile>, TenantError> {
        let tenant_id = self.loader.cache_key(tenant_id);
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&tenant_id).filter(|entry| entry.is_fresh(self.ttl)) {
                return Ok(Arc::clone(&entry.profile));
            }
        }

        self.store(&tenant_id)
    }

    /// Loads the tenant again regardless of what is cached. A failed load
    /// leaves any previous entry in place.
    pub fn reload(&self, tenant_id: &TenantId) -> Result<Arc<TenantProfile>, TenantError> {
        self.store(&self.loader.cache_key(tenant_id))
    }

    fn store(&self, tenant_id: &TenantId) -> Result<Arc<TenantProfile>, TenantError> {
        let profile = Arc::new(self.loader.load(tenant_id)?);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            tenant_id.clone(),
            CacheEntry { profile: Arc::clone(&profile), loaded_at: Instant::now() },
        );
        debug!(
            event_name = "tenant.cache.stored",
            tenant_id = %tenant_id,
            cached = entries.len(),
            "tenant profile cached"
        );

        Ok(profile)
    }

    pub fn invalidate(&self, tenant_id: &TenantId) -> bool {
        let tenant_id = self.loader.cache_key(tenant_id);
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tenant_id)
            .is_some();
        if removed {
            info!(event_name = "tenant.cache.invalidated", tenant_id = %tenant_id, "tenant evicted");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
        info!(event_name = "tenant.cache.cleared", "tenant cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
