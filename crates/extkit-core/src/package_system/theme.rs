use serde::Serialize;

use crate::package_system::cache::CacheScope;
use crate::package_system::context::PackageContext;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::installer::build_record;
use crate::package_system::manifest::ManifestLoader;
use crate::registry::PackageKind;
use crate::storage::Location;

#[derive(Debug, Clone, Serialize)]
pub struct ThemeInstallReport {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub is_new: bool,
    pub active: bool,
    pub assets_published: Option<u64>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub slug: String,
    pub already_active: bool,
    /// Themes switched off by this activation
    pub deactivated: usize,
}

/// Registers themes and keeps at most one of them active.
pub struct ThemeActivator<'a> {
    ctx: &'a PackageContext,
}

impl<'a> ThemeActivator<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    /// Register (or refresh) a theme found under the themes root
    pub fn install_theme(&self, slug: &str) -> Result<ThemeInstallReport> {
        let store = &self.ctx.store;
        if !store.contains(Location::Themes, slug) {
            return Err(PackageError::not_found(slug, "not present in the themes directory"));
        }

        let dir = store.absolute_package_path(Location::Themes, slug);
        let manifest = ManifestLoader::load_dir(&dir, store.manifest_file())?;
        manifest.verify_slug(slug)?;

        let existing = self.ctx.registry.find(slug)?;
        if let Some(record) = &existing {
            if !record.is_theme() {
                return Err(PackageError::Conflict(format!("'{}' is registered as a plugin", slug)));
            }
        }

        let record = build_record(slug, &manifest, existing.as_ref(), PackageKind::Theme);
        self.ctx.registry.transaction(|tx| tx.upsert(&record))?;

        let mut warnings = Vec::new();
        let assets_published = match store.publish_assets(Location::Themes, slug, PackageKind::Theme.asset_location()) {
            Ok(copied) => copied,
            Err(e) => {
                let warning = format!("assets of theme '{}' were not published: {}", slug, e);
                log::warn!("{}", warning);
                warnings.push(warning);
                None
            }
        };

        self.ctx.invalidate(&[CacheScope::Views]);
        log::info!(
            "{} theme '{}' {}",
            if existing.is_some() { "Refreshed" } else { "Registered" },
            slug,
            record.version
        );

        Ok(ThemeInstallReport {
            slug: slug.to_string(),
            name: record.name,
            version: record.version,
            is_new: existing.is_none(),
            active: record.enabled,
            assets_published,
            warnings,
        })
    }

    /// Make `slug` the only enabled theme
    pub fn activate_theme(&self, slug: &str) -> Result<ActivationReport> {
        let record = self
            .ctx
            .registry
            .find(slug)?
            .ok_or_else(|| PackageError::not_found(slug, "no installed theme with this slug"))?;
        if !record.is_theme() {
            return Err(PackageError::Validation(format!("'{}' is a plugin, not a theme", slug)));
        }
        if !self.ctx.store.contains(Location::Themes, slug) {
            log::warn!("Activating theme '{}' whose files are missing from {}", slug, Location::Themes);
        }

        // Others first: the unique index rejects two enabled themes at any point
        let deactivated = self.ctx.registry.transaction(|tx| -> Result<usize> {
            let deactivated = tx.deactivate_themes_except(slug)?;
            tx.set_enabled(slug, true)?;
            Ok(deactivated)
        })?;

        self.ctx.invalidate(&[CacheScope::Views]);
        log::info!("Activated theme '{}' ({} deactivated)", slug, deactivated);
        Ok(ActivationReport {
            slug: slug.to_string(),
            already_active: record.enabled,
            deactivated,
        })
    }
}
