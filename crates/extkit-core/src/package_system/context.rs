use std::fmt;
use std::sync::Arc;

use crate::package_system::cache::{CacheInvalidator, CacheScope};
use crate::package_system::lifecycle::HookRegistry;
use crate::registry::PackageRegistry;
use crate::storage::PackageStore;

/// Shared services every lifecycle component works against
#[derive(Clone)]
pub struct PackageContext {
    pub store: PackageStore,
    pub registry: Arc<PackageRegistry>,
    pub hooks: Arc<HookRegistry>,
    pub cache: Arc<dyn CacheInvalidator>,
}

impl PackageContext {
    pub fn new(
        store: PackageStore,
        registry: Arc<PackageRegistry>,
        hooks: Arc<HookRegistry>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            store,
            registry,
            hooks,
            cache,
        }
    }

    pub fn invalidate(&self, scopes: &[CacheScope]) {
        for scope in scopes {
            self.cache.invalidate(*scope);
        }
    }
}

impl fmt::Debug for PackageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageContext")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .field("cache", &self.cache)
            .finish()
    }
}
