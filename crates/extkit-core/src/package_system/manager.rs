use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::component::KernelComponent;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result as KernelResult};
use crate::package_system::cache::CacheInvalidator;
use crate::package_system::context::PackageContext;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::importer::PackageImporter;
use crate::package_system::installer::Installer;
use crate::package_system::lifecycle::HookRegistry;
use crate::package_system::listing::Listings;
use crate::package_system::locks::{SlugLocks, RECOVERY_LOCK_KEY, THEMES_LOCK_KEY};
use crate::package_system::manifest::normalize_slug;
use crate::package_system::reconcile::{ReconcileReport, Reconciler, RecoveryFailure};
use crate::package_system::result::OperationResult;
use crate::package_system::scaffold::Scaffolder;
use crate::package_system::theme::ThemeActivator;
use crate::package_system::toggle::Toggle;
use crate::package_system::uninstaller::Uninstaller;
use crate::registry::{PackageKind, PackageRegistry};
use crate::storage::config::ManagerConfig;
use crate::storage::store::PackageStore;

/// Package lifecycle component interface.
///
/// Every operation reports through an [`OperationResult`]; none of them
/// return an error or panic to the caller.
#[async_trait]
pub trait PackageManager: KernelComponent {
    /// Installed plugins plus unregistered code in the active store
    async fn list_available(&self) -> OperationResult;

    async fn list_staging(&self) -> OperationResult;

    async fn list_disabled(&self) -> OperationResult;

    async fn list_themes(&self) -> OperationResult;

    /// Extract a zip package into staging (plugins) or the themes root (themes)
    async fn upload(&self, bytes: &[u8], kind: PackageKind) -> OperationResult;

    /// Install or upgrade a staged plugin
    async fn install(&self, slug: &str) -> OperationResult;

    /// Drop the registration, migrations and published assets; code stays on disk
    async fn uninstall(&self, slug: &str) -> OperationResult;

    async fn enable(&self, slug: &str) -> OperationResult;

    async fn disable(&self, slug: &str) -> OperationResult;

    async fn reactivate(&self, slug: &str) -> OperationResult;

    async fn remove_from_staging(&self, slug: &str) -> OperationResult;

    async fn install_theme(&self, slug: &str) -> OperationResult;

    async fn activate_theme(&self, slug: &str) -> OperationResult;

    /// Generate an empty plugin skeleton in staging
    async fn scaffold(&self, slug: &str, name: &str) -> OperationResult;

    /// Report drift between registry and filesystem without changing anything
    async fn verify(&self) -> OperationResult;

    /// Recover interrupted operations and relocate misplaced plugin code
    async fn reconcile(&self) -> OperationResult;
}

/// Default implementation of the package manager.
///
/// Blocking work runs on tokio's blocking pool while the per-slug lock is held.
#[derive(Clone)]
pub struct DefaultPackageManager {
    name: &'static str,
    ctx: Arc<PackageContext>,
    locks: Arc<SlugLocks>,
}

impl DefaultPackageManager {
    pub fn new(ctx: PackageContext) -> Self {
        Self {
            name: "DefaultPackageManager",
            ctx: Arc::new(ctx),
            locks: Arc::new(SlugLocks::new()),
        }
    }

    /// Open the registry database named by `config` and build the context around `store`
    pub fn open(
        config: &ManagerConfig,
        store: PackageStore,
        hooks: Arc<HookRegistry>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> KernelResult<Self> {
        let registry = PackageRegistry::open(&config.database_path())?;
        Ok(Self::new(PackageContext::new(store, Arc::new(registry), hooks, cache)))
    }

    pub fn context(&self) -> &Arc<PackageContext> {
        &self.ctx
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.ctx.hooks
    }

    pub fn locks(&self) -> &SlugLocks {
        &self.locks
    }

    /// Run blocking package work off the async executor
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PackageContext) -> Result<T> + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        tokio::task::spawn_blocking(move || work(&ctx))
            .await
            .map_err(|e| PackageError::Internal(format!("package task did not complete: {}", e)))?
    }

    /// Normalize `raw`, hold its lock and run `work` on the canonical slug.
    ///
    /// The guard moves into the blocking closure, so the lock is released only
    /// when the work itself has finished, even if the caller's future is dropped.
    async fn with_slug<T, F>(&self, raw: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PackageContext, &str) -> Result<T> + Send + 'static,
    {
        let slug = normalize_slug(raw)?;
        let guard = self.locks.acquire(&slug).await;
        log::debug!("Holding lock for '{}'", guard.key());
        self.blocking(move |ctx| {
            let _guard = guard;
            work(ctx, &slug)
        })
        .await
    }

    /// Roll back operations a previous process left unfinished
    pub async fn recover_pending(&self) -> Result<ReconcileReport> {
        let _guard = self.locks.acquire(RECOVERY_LOCK_KEY).await;
        self.recover_each().await
    }

    /// Recover each pending marker under its own slug lock.
    ///
    /// Markers are listed up front; one whose operation is still running is
    /// waited for and skipped once it has committed.
    async fn recover_each(&self) -> Result<ReconcileReport> {
        let markers = self
            .blocking(|ctx| Ok(ctx.registry.read(|tx| tx.pending_operations())?))
            .await?;
        let mut report = ReconcileReport::default();
        for op in markers {
            match self.with_slug(&op.slug, |ctx, slug| Reconciler::new(ctx).recover_slug(slug)).await {
                Ok(true) => report.recovered.push(op.slug),
                Ok(false) => log::debug!("'{}' finished before recovery reached it", op.slug),
                Err(e) => {
                    log::error!("Recovery of '{}' failed: {}", op.slug, e);
                    report.failed.push(RecoveryFailure {
                        slug: op.slug,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn reconcile_locked(&self) -> Result<ReconcileReport> {
        let _guard = self.locks.acquire(RECOVERY_LOCK_KEY).await;
        let mut report = self.recover_each().await?;

        let drift = self.blocking(|ctx| Reconciler::new(ctx).verify()).await?;
        for entry in drift.misplaced {
            match self.with_slug(&entry.slug, |ctx, slug| Reconciler::new(ctx).relocate(slug)).await {
                Ok(true) => report.relocated.push(entry.slug),
                Ok(false) => {}
                Err(e) => report.failed.push(RecoveryFailure {
                    slug: entry.slug,
                    error: e.to_string(),
                }),
            }
        }

        report.remaining = self.blocking(|ctx| Reconciler::new(ctx).verify()).await?;
        Ok(report)
    }
}

fn count<T>(noun: &str) -> impl FnOnce(&Vec<T>) -> String + '_ {
    move |items| format!("{} {}", items.len(), noun)
}

impl Debug for DefaultPackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPackageManager")
            .field("name", &self.name)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for DefaultPackageManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> KernelResult<()> {
        match self.ctx.registry.location() {
            Some(path) => log::info!("Package registry at {}", path.display()),
            None => log::info!("Package registry held in memory"),
        }
        Ok(())
    }

    async fn start(&self) -> KernelResult<()> {
        let report = self.recover_pending().await.map_err(|e| {
            Error::lifecycle(
                KernelLifecyclePhase::Recovery,
                self.name,
                "could not read pending operations",
                e.into(),
            )
        })?;
        if !report.recovered.is_empty() {
            log::info!("Recovered interrupted operations: {}", report.recovered.join(", "));
        }
        for failure in &report.failed {
            log::error!("'{}' still needs manual repair: {}", failure.slug, failure.error);
        }
        Ok(())
    }

    async fn stop(&self) -> KernelResult<()> {
        self.ctx.hooks.clear();
        log::info!("Lifecycle hooks released");
        Ok(())
    }
}

#[async_trait]
impl PackageManager for DefaultPackageManager {
    async fn list_available(&self) -> OperationResult {
        let outcome = self.blocking(|ctx| Listings::new(ctx).available()).await;
        OperationResult::from_outcome(outcome, count("plugins available"))
    }

    async fn list_staging(&self) -> OperationResult {
        let outcome = self.blocking(|ctx| Listings::new(ctx).staging()).await;
        OperationResult::from_outcome(outcome, count("packages in staging"))
    }

    async fn list_disabled(&self) -> OperationResult {
        let outcome = self.blocking(|ctx| Listings::new(ctx).disabled()).await;
        OperationResult::from_outcome(outcome, count("disabled packages"))
    }

    async fn list_themes(&self) -> OperationResult {
        let outcome = self.blocking(|ctx| Listings::new(ctx).themes()).await;
        OperationResult::from_outcome(outcome, count("themes"))
    }

    async fn upload(&self, bytes: &[u8], kind: PackageKind) -> OperationResult {
        let slug = match PackageImporter::peek_slug(bytes) {
            Ok(slug) => slug,
            Err(e) => return OperationResult::from_outcome(Err::<(), _>(e), |_| String::new()),
        };
        let bytes = bytes.to_vec();
        let outcome = self
            .with_slug(&slug, move |ctx, _| PackageImporter::new(ctx).upload(&bytes, kind))
            .await;
        OperationResult::from_outcome(outcome, |r| {
            format!(
                "Uploaded {} '{}' {}{}",
                r.kind,
                r.slug,
                r.new_version,
                match &r.current_version {
                    Some(current) => format!(" (upgrade from {})", current),
                    None => String::new(),
                }
            )
        })
    }

    async fn install(&self, slug: &str) -> OperationResult {
        let outcome = self.with_slug(slug, |ctx, slug| Installer::new(ctx).install(slug)).await;
        OperationResult::from_outcome(outcome, |r| match &r.previous_version {
            Some(previous) => format!("Upgraded '{}' from {} to {}", r.slug, previous, r.version),
            None => format!("Installed '{}' {}", r.slug, r.version),
        })
    }

    async fn uninstall(&self, slug: &str) -> OperationResult {
        let outcome = self
            .with_slug(slug, |ctx, slug| Uninstaller::new(ctx).uninstall(slug))
            .await;
        OperationResult::from_outcome(outcome, |r| format!("Uninstalled {} '{}'", r.kind, r.slug))
    }

    async fn enable(&self, slug: &str) -> OperationResult {
        let outcome = self.with_slug(slug, |ctx, slug| Toggle::new(ctx).enable(slug)).await;
        OperationResult::from_outcome(outcome, |r| format!("Enabled '{}'", r.slug))
    }

    async fn disable(&self, slug: &str) -> OperationResult {
        let outcome = self.with_slug(slug, |ctx, slug| Toggle::new(ctx).disable(slug)).await;
        OperationResult::from_outcome(outcome, |r| {
            if r.dependents.is_empty() {
                format!("Disabled '{}'", r.slug)
            } else {
                format!("Disabled '{}'; still required by {}", r.slug, r.dependents.join(", "))
            }
        })
    }

    async fn reactivate(&self, slug: &str) -> OperationResult {
        let outcome = self.with_slug(slug, |ctx, slug| Toggle::new(ctx).reactivate(slug)).await;
        OperationResult::from_outcome(outcome, |r| format!("Reactivated '{}'", r.slug))
    }

    async fn remove_from_staging(&self, slug: &str) -> OperationResult {
        let outcome = self
            .with_slug(slug, |ctx, slug| {
                PackageImporter::new(ctx).remove_staged(slug)?;
                Ok(slug.to_string())
            })
            .await;
        OperationResult::from_outcome(outcome, |slug| format!("Removed '{}' from staging", slug))
    }

    async fn install_theme(&self, slug: &str) -> OperationResult {
        let outcome = self
            .with_slug(slug, |ctx, slug| ThemeActivator::new(ctx).install_theme(slug))
            .await;
        OperationResult::from_outcome(outcome, |r| format!("Installed theme '{}' {}", r.slug, r.version))
    }

    async fn activate_theme(&self, slug: &str) -> OperationResult {
        // Themes-wide key first so activations never wait on each other in opposite order
        let themes = self.locks.acquire(THEMES_LOCK_KEY).await;
        let outcome = self
            .with_slug(slug, move |ctx, slug| {
                let _themes = themes;
                ThemeActivator::new(ctx).activate_theme(slug)
            })
            .await;
        OperationResult::from_outcome(outcome, |r| format!("Activated theme '{}'", r.slug))
    }

    async fn scaffold(&self, slug: &str, name: &str) -> OperationResult {
        let name = name.to_string();
        let outcome = self
            .with_slug(slug, move |ctx, slug| Scaffolder::new(ctx).scaffold(slug, &name))
            .await;
        OperationResult::from_outcome(outcome, |r| format!("Scaffolded '{}' in staging", r.slug))
    }

    async fn verify(&self) -> OperationResult {
        let outcome = self.blocking(|ctx| Reconciler::new(ctx).verify()).await;
        OperationResult::from_outcome(outcome, |r| {
            if r.is_clean() {
                "Registry and filesystem agree".to_string()
            } else {
                format!("{} drift issues found", r.issue_count())
            }
        })
    }

    async fn reconcile(&self) -> OperationResult {
        let outcome = self.reconcile_locked().await;
        OperationResult::from_outcome(outcome, |r| {
            format!(
                "Recovered {}, relocated {}, {} failed, {} issues remain",
                r.recovered.len(),
                r.relocated.len(),
                r.failed.len(),
                r.remaining.issue_count()
            )
        })
    }
}
