use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Host caches that must be dropped after code changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    Config,
    Routes,
    Views,
}

impl CacheScope {
    pub const ALL: [CacheScope; 3] = [CacheScope::Config, CacheScope::Routes, CacheScope::Views];
}

/// Fire-and-forget cache invalidation; must be idempotent
pub trait CacheInvalidator: Send + Sync + Debug {
    fn invalidate(&self, scope: CacheScope);
}

/// Default invalidator: records the request in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCacheInvalidator;

impl CacheInvalidator for LogCacheInvalidator {
    fn invalidate(&self, scope: CacheScope) {
        log::info!("Invalidating {:?} cache", scope);
    }
}

/// Remembers every invalidation, for embedding hosts and tests
#[derive(Debug, Default)]
pub struct RecordingCacheInvalidator {
    calls: Mutex<Vec<CacheScope>>,
}

impl RecordingCacheInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CacheScope> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Vec<CacheScope> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CacheInvalidator for RecordingCacheInvalidator {
    fn invalidate(&self, scope: CacheScope) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(scope);
    }
}
