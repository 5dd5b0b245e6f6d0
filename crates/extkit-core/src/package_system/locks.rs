use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock key that serializes theme activation across all theme slugs
pub const THEMES_LOCK_KEY: &str = "@themes";

/// Lock key held while recovering interrupted operations in bulk
pub const RECOVERY_LOCK_KEY: &str = "@recovery";

/// In-process exclusive locks keyed by slug.
///
/// Entries nobody holds or waits for are pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct SlugLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one operation on `key`
#[derive(Debug)]
pub struct SlugGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl SlugGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl SlugLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> SlugGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        SlugGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Number of keys currently tracked
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
