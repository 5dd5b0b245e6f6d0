use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use crate::package_system::cache::CacheScope;
use crate::package_system::context::PackageContext;
use crate::package_system::dependency::DependencyResolver;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::lifecycle::{HookContext, HookOutcome, HookPhase};
use crate::package_system::manifest::{merge_config, Manifest, ManifestLoader};
use crate::package_system::reconcile::Reconciler;
use crate::registry::{discover_migrations, InstalledRecord, MigrationScript, PackageKind, PendingKind, PendingOperation, PendingPhase};
use crate::storage::Location;

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub previous_version: Option<String>,
    pub is_upgrade: bool,
    pub enabled: bool,
    /// Migrations applied by this install
    pub migrations: Vec<String>,
    /// Snapshot of the replaced code, provider-relative
    pub backup: Option<PathBuf>,
    pub hook: HookOutcome,
    /// Number of published asset files; `None` when the package has no assets
    pub assets_published: Option<u64>,
    /// Post-commit problems that did not fail the install
    pub warnings: Vec<String>,
    pub advisories: Vec<String>,
}

/// Moves staged plugins live and registers them.
pub struct Installer<'a> {
    ctx: &'a PackageContext,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    pub fn install(&self, slug: &str) -> Result<InstallReport> {
        let store = &self.ctx.store;
        if !store.contains(Location::Staging, slug) {
            return Err(PackageError::not_found(slug, "not present in staging"));
        }

        let staged_dir = store.absolute_package_path(Location::Staging, slug);
        let manifest = ManifestLoader::load_dir(&staged_dir, store.manifest_file())?;
        manifest.verify_slug(slug)?;

        let existing = self.ctx.registry.find(slug)?;
        if let Some(record) = &existing {
            if record.is_theme() {
                return Err(PackageError::Conflict(format!("'{}' is registered as a theme", slug)));
            }
        }

        let deps = self
            .ctx
            .registry
            .read(|tx| DependencyResolver::check(tx, &manifest.dependencies))?;
        if !deps.satisfied {
            return Err(PackageError::Validation(deps.missing_message(slug)));
        }

        let scripts = discover_migrations(&staged_dir)?;
        let target = match &existing {
            Some(record) if !record.enabled => Location::Disabled,
            _ => Location::Active,
        };
        let operation = if existing.is_some() {
            PendingKind::Upgrade
        } else {
            PendingKind::Install
        };

        self.ctx
            .registry
            .transaction(|tx| tx.put_pending(&PendingOperation::new(slug, operation)))?;

        let committed = self
            .swap_code(slug, operation, target)
            .and_then(|backup| self.commit(slug, &manifest, existing.as_ref(), &scripts).map(|c| (backup, c)));
        let (backup, (migrations, record)) = match committed {
            Ok(done) => done,
            Err(e) => {
                Reconciler::new(self.ctx).compensate(slug);
                return Err(e);
            }
        };

        log::info!(
            "{} '{}' {} into {}",
            if existing.is_some() { "Upgraded" } else { "Installed" },
            slug,
            record.version,
            target
        );

        let mut warnings = Vec::new();
        let phase = if existing.is_some() {
            HookPhase::Upgrade
        } else {
            HookPhase::Install
        };
        let code_dir = store.absolute_package_path(target, slug);
        let previous_version = existing.as_ref().map(|r| r.version.clone());
        let hook = match &record.hook_entry {
            Some(entry) => self.ctx.hooks.invoke(
                entry,
                phase,
                &HookContext {
                    slug,
                    version: &record.version,
                    previous_version: previous_version.as_deref(),
                    config: &record.config,
                    package_dir: &code_dir,
                },
            ),
            None => HookOutcome::NotRegistered,
        };
        if let Some(warning) = hook.warning(slug, phase) {
            warnings.push(warning);
        }

        let assets_published = match store.publish_assets(target, slug, PackageKind::Plugin.asset_location()) {
            Ok(copied) => copied,
            Err(e) => {
                let warning = format!("assets of '{}' were not published: {}", slug, e);
                log::warn!("{}", warning);
                warnings.push(warning);
                None
            }
        };

        self.ctx.invalidate(&CacheScope::ALL);

        Ok(InstallReport {
            slug: slug.to_string(),
            name: record.name,
            version: record.version,
            previous_version,
            is_upgrade: existing.is_some(),
            enabled: record.enabled,
            migrations,
            backup,
            hook,
            assets_published,
            warnings,
            advisories: deps.advisories,
        })
    }

    /// Snapshot and clear the current code, then move the staged copy into `target`
    fn swap_code(&self, slug: &str, operation: PendingKind, target: Location) -> Result<Option<PathBuf>> {
        let store = &self.ctx.store;
        let mut backup = None;

        if store.contains(target, slug) {
            let path = match operation {
                PendingKind::Upgrade => {
                    let path = store.snapshot(target, slug, "upgrade")?;
                    self.record_backup(slug, operation, &path)?;
                    store.remove_package(target, slug)?;
                    path
                }
                // Unregistered code in the way of a fresh install
                _ => {
                    let path = store.set_aside(target, slug, "replaced")?;
                    self.record_backup(slug, operation, &path)?;
                    path
                }
            };
            backup = Some(path);
        } else if operation == PendingKind::Upgrade {
            log::warn!("Upgrading '{}' whose previous code is missing from {}", slug, target);
        }

        store.move_package(slug, Location::Staging, target)?;
        self.ctx
            .registry
            .transaction(|tx| tx.set_pending_phase(slug, PendingPhase::Moved))?;
        Ok(backup)
    }

    fn record_backup(&self, slug: &str, operation: PendingKind, backup: &std::path::Path) -> Result<()> {
        let marker = PendingOperation::new(slug, operation).with_backup(Some(backup.to_path_buf()));
        self.ctx.registry.transaction(|tx| tx.put_pending(&marker))?;
        Ok(())
    }

    /// Migrations, record and marker removal in one transaction
    fn commit(
        &self,
        slug: &str,
        manifest: &Manifest,
        existing: Option<&InstalledRecord>,
        scripts: &[MigrationScript],
    ) -> Result<(Vec<String>, InstalledRecord)> {
        self.ctx.registry.transaction(|tx| -> Result<(Vec<String>, InstalledRecord)> {
            let ran = tx.apply_migrations(slug, scripts)?;
            let record = build_record(slug, manifest, existing, PackageKind::Plugin);
            tx.upsert(&record)?;
            tx.clear_pending(slug)?;
            Ok((ran, record))
        })
    }
}

/// Registry record for `manifest`; upgrades keep `enabled`, `installed_at` and configured values
pub(crate) fn build_record(
    slug: &str,
    manifest: &Manifest,
    existing: Option<&InstalledRecord>,
    kind: PackageKind,
) -> InstalledRecord {
    let now = Utc::now();
    let (enabled, installed_at, config) = match existing {
        Some(prev) => (prev.enabled, prev.installed_at, merge_config(&prev.config, &manifest.config)),
        None => (kind == PackageKind::Plugin, now, manifest.config.clone()),
    };
    InstalledRecord {
        slug: slug.to_string(),
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        kind,
        description: manifest.description.clone(),
        author: manifest.author.clone(),
        dependencies: manifest.dependencies.clone(),
        config,
        enabled,
        hook_entry: Some(manifest.hook_entry(slug)),
        installed_at,
        updated_at: now,
    }
}
