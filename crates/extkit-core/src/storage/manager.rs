use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;
use crate::storage::config::ManagerConfig;
use crate::storage::store::{Location, PackageStore};

/// Kernel component owning the filesystem store.
///
/// Initialization creates every location root so later operations can rely
/// on them existing.
#[derive(Debug, Clone)]
pub struct DefaultStorageManager {
    name: &'static str,
    base_dir: PathBuf,
    store: PackageStore,
}

impl DefaultStorageManager {
    /// Local filesystem storage laid out as `config` describes
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            name: "DefaultStorageManager",
            base_dir: config.base_dir.clone(),
            store: PackageStore::from_config(config),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }
}

#[async_trait]
impl KernelComponent for DefaultStorageManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        self.store.ensure_layout()?;
        for location in Location::ALL {
            log::debug!("{} -> {}", location, self.store.absolute_root(location).display());
        }
        log::info!("Storage layout ready under {}", self.base_dir.display());
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
