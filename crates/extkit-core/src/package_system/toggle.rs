use std::path::PathBuf;

use serde::Serialize;

use crate::package_system::cache::CacheScope;
use crate::package_system::context::PackageContext;
use crate::package_system::dependency::DependencyResolver;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::reconcile::Reconciler;
use crate::registry::{InstalledRecord, PendingKind, PendingOperation, PendingPhase};
use crate::storage::Location;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToggleReport {
    pub slug: String,
    pub enabled: bool,
    /// Whether code changed stores
    pub moved: bool,
    /// Where a stale directory at the destination was moved
    pub set_aside: Option<PathBuf>,
    /// Enabled plugins that still declare a dependency on this one
    pub dependents: Vec<String>,
    pub advisories: Vec<String>,
}

/// Moves plugin code between the active and disabled stores.
pub struct Toggle<'a> {
    ctx: &'a PackageContext,
}

impl<'a> Toggle<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    pub fn disable(&self, slug: &str) -> Result<ToggleReport> {
        let record = self.plugin_record(slug)?;
        if !record.enabled {
            return Err(PackageError::Conflict(format!("'{}' is already disabled", slug)));
        }

        let dependents = self.ctx.registry.read(|tx| tx.enabled_dependents(slug))?;
        if !dependents.is_empty() {
            log::warn!(
                "Disabling '{}' while enabled plugins depend on it: {}",
                slug,
                dependents.join(", ")
            );
        }

        let store = &self.ctx.store;
        let mut report = if store.contains(Location::Active, slug) {
            self.relocate(slug, PendingKind::Disable, Location::Active, Location::Disabled, false)?
        } else if store.contains(Location::Disabled, slug) {
            log::warn!("'{}' is enabled but its code is already in {}", slug, Location::Disabled);
            self.flip(slug, false)?
        } else {
            return Err(PackageError::not_found(slug, "code directory is missing from the active store"));
        };

        report.dependents = dependents;
        Ok(report)
    }

    /// Bring a disabled plugin's code back into the active store
    pub fn reactivate(&self, slug: &str) -> Result<ToggleReport> {
        let record = self.plugin_record(slug)?;
        if record.enabled {
            return Err(PackageError::Conflict(format!("'{}' is already enabled", slug)));
        }
        if !self.ctx.store.contains(Location::Disabled, slug) {
            return Err(PackageError::not_found(slug, "no code in the disabled store"));
        }

        let advisories = self.check_dependencies(&record)?;
        let mut report = self.relocate(slug, PendingKind::Reactivate, Location::Disabled, Location::Active, true)?;
        report.advisories = advisories;
        Ok(report)
    }

    /// Enable a disabled plugin wherever its code currently sits
    pub fn enable(&self, slug: &str) -> Result<ToggleReport> {
        let record = self.plugin_record(slug)?;
        if record.enabled {
            return Err(PackageError::Conflict(format!("'{}' is already enabled", slug)));
        }

        let store = &self.ctx.store;
        if store.contains(Location::Disabled, slug) {
            return self.reactivate(slug);
        }
        if !store.contains(Location::Active, slug) {
            return Err(PackageError::not_found(slug, "code directory is missing"));
        }

        let advisories = self.check_dependencies(&record)?;
        let mut report = self.flip(slug, true)?;
        report.advisories = advisories;
        Ok(report)
    }

    fn plugin_record(&self, slug: &str) -> Result<InstalledRecord> {
        let record = self
            .ctx
            .registry
            .find(slug)?
            .ok_or_else(|| PackageError::not_found(slug, "is not installed"))?;
        if record.is_theme() {
            return Err(PackageError::Validation(format!(
                "'{}' is a theme; themes are switched by activating another theme",
                slug
            )));
        }
        Ok(record)
    }

    fn check_dependencies(&self, record: &InstalledRecord) -> Result<Vec<String>> {
        let deps = self
            .ctx
            .registry
            .read(|tx| DependencyResolver::check(tx, &record.dependencies))?;
        if !deps.satisfied {
            return Err(PackageError::Validation(deps.missing_message(&record.slug)));
        }
        Ok(deps.advisories)
    }

    /// Marker, move, then commit the flag together with marker removal
    fn relocate(&self, slug: &str, operation: PendingKind, from: Location, to: Location, enabled: bool) -> Result<ToggleReport> {
        let store = &self.ctx.store;
        self.ctx
            .registry
            .transaction(|tx| tx.put_pending(&PendingOperation::new(slug, operation)))?;

        let outcome = (|| -> Result<Option<PathBuf>> {
            let set_aside = if store.contains(to, slug) {
                let path = store.set_aside(to, slug, &format!("stale-{}", to))?;
                let marker = PendingOperation::new(slug, operation).with_backup(Some(path.clone()));
                self.ctx.registry.transaction(|tx| tx.put_pending(&marker))?;
                Some(path)
            } else {
                None
            };
            store.move_package(slug, from, to)?;
            self.ctx
                .registry
                .transaction(|tx| tx.set_pending_phase(slug, PendingPhase::Moved))?;
            self.ctx.registry.transaction(|tx| -> Result<()> {
                tx.set_enabled(slug, enabled)?;
                tx.clear_pending(slug)?;
                Ok(())
            })?;
            Ok(set_aside)
        })();

        let set_aside = match outcome {
            Ok(set_aside) => set_aside,
            Err(e) => {
                Reconciler::new(self.ctx).compensate(slug);
                return Err(e);
            }
        };

        self.ctx.invalidate(&CacheScope::ALL);
        log::info!("{} '{}' ({} -> {})", if enabled { "Enabled" } else { "Disabled" }, slug, from, to);
        Ok(ToggleReport {
            slug: slug.to_string(),
            enabled,
            moved: true,
            set_aside,
            ..ToggleReport::default()
        })
    }

    /// Flag-only change for code that already sits in the right store
    fn flip(&self, slug: &str, enabled: bool) -> Result<ToggleReport> {
        self.ctx.registry.transaction(|tx| tx.set_enabled(slug, enabled))?;
        self.ctx.invalidate(&CacheScope::ALL);
        log::info!("{} '{}' without moving code", if enabled { "Enabled" } else { "Disabled" }, slug);
        Ok(ToggleReport {
            slug: slug.to_string(),
            enabled,
            ..ToggleReport::default()
        })
    }
}
