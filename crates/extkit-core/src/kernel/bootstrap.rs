use std::sync::Arc;

use tokio::sync::Mutex;

use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::package_system::{CacheInvalidator, DefaultPackageManager, HookRegistry, LogCacheInvalidator};
use crate::storage::{DefaultStorageManager, ManagerConfig};

/// Main application struct coordinating components via dependency injection
pub struct Application {
    config: ManagerConfig,
    initialized: bool,
    dependencies: Arc<Mutex<DependencyRegistry>>,
    hooks: Arc<HookRegistry>,
    storage_manager: Arc<DefaultStorageManager>,
    package_manager: Arc<DefaultPackageManager>,
}

impl Application {
    /// Application over `config` with an empty hook registry and log-only cache invalidation
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_services(config, Arc::new(HookRegistry::new()), Arc::new(LogCacheInvalidator))
    }

    /// Application using caller-provided hook registry and cache invalidator
    pub fn with_services(
        config: ManagerConfig,
        hooks: Arc<HookRegistry>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let mut registry = DependencyRegistry::new();

        // Registration order is the initialization order
        let storage_manager = Arc::new(DefaultStorageManager::new(&config));
        registry.register_instance(storage_manager.clone())?;

        let package_manager = Arc::new(
            DefaultPackageManager::open(&config, storage_manager.store().clone(), hooks.clone(), cache).map_err(
                |e| Error::lifecycle(KernelLifecyclePhase::Bootstrap, "DefaultPackageManager", "cannot open registry", e),
            )?,
        );
        registry.register_instance(package_manager.clone())?;

        Ok(Application {
            config,
            initialized: false,
            dependencies: Arc::new(Mutex::new(registry)),
            hooks,
            storage_manager,
            package_manager,
        })
    }

    /// Gets a specific component instance by its concrete type T.
    pub async fn get_component<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        let registry = self.dependencies.lock().await;
        registry.get_concrete::<T>()
    }

    /// Initialize and start every component; startup recovery runs here.
    pub async fn run(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::RunPreCheck,
                component_name: None,
                message: "Application already initialized".to_string(),
                source: None,
            });
        }

        let components = self.dependencies.lock().await.components();

        log::info!("Initializing components...");
        for component in &components {
            log::debug!("Initializing component: {}", component.name());
            component
                .initialize()
                .await
                .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Initialize, component.name(), "initialize failed", e))?;
        }

        log::info!("Starting components...");
        for component in &components {
            log::debug!("Starting component: {}", component.name());
            component
                .start()
                .await
                .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Start, component.name(), "start failed", e))?;
        }

        self.initialized = true;
        log::info!("{} ready under {}", constants::APP_NAME, self.config.base_dir.display());
        Ok(())
    }

    /// Stop all components in reverse registration order.
    ///
    /// Every component is asked to stop; the first failure is returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        log::info!("Shutting down components...");
        let components = self.dependencies.lock().await.components();

        let mut first_error = None;
        for component in components.iter().rev() {
            log::debug!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                if first_error.is_none() {
                    first_error = Some(Error::lifecycle(
                        KernelLifecyclePhase::Shutdown,
                        component.name(),
                        "component failed to stop",
                        e,
                    ));
                }
            }
        }

        self.initialized = false;
        match first_error {
            Some(e) => Err(e),
            None => {
                log::info!("Shutdown complete.");
                Ok(())
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Registry lifecycle hooks are resolved through; register packages here before `run`
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn storage_manager(&self) -> &Arc<DefaultStorageManager> {
        &self.storage_manager
    }

    pub fn package_manager(&self) -> &Arc<DefaultPackageManager> {
        &self.package_manager
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("base_dir", &self.config.base_dir)
            .field("initialized", &self.initialized)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
