use serde::Serialize;

use crate::package_system::cache::CacheScope;
use crate::package_system::context::PackageContext;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::lifecycle::{HookContext, HookOutcome, HookPhase};
use crate::registry::{discover_migrations, PackageKind, RollbackSummary};

#[derive(Debug, Clone, Serialize)]
pub struct UninstallReport {
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub version: String,
    pub hook: HookOutcome,
    pub migrations: RollbackSummary,
    pub assets_removed: bool,
    pub warnings: Vec<String>,
}

/// Removes a package's registration and generated artifacts.
///
/// The code directory stays where it is; deleting it is a separate,
/// explicit step.
pub struct Uninstaller<'a> {
    ctx: &'a PackageContext,
}

impl<'a> Uninstaller<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    pub fn uninstall(&self, slug: &str) -> Result<UninstallReport> {
        let store = &self.ctx.store;
        let record = self
            .ctx
            .registry
            .find(slug)?
            .ok_or_else(|| PackageError::not_found(slug, "is not installed"))?;

        let mut warnings = Vec::new();
        let code_location = record.code_location();
        let code_dir = store.absolute_package_path(code_location, slug);

        let hook = match &record.hook_entry {
            Some(entry) => self.ctx.hooks.invoke(
                entry,
                HookPhase::Uninstall,
                &HookContext {
                    slug,
                    version: &record.version,
                    previous_version: None,
                    config: &record.config,
                    package_dir: &code_dir,
                },
            ),
            None => HookOutcome::NotRegistered,
        };
        if let Some(warning) = hook.warning(slug, HookPhase::Uninstall) {
            warnings.push(warning);
        }

        let scripts = if store.contains(code_location, slug) {
            discover_migrations(&code_dir)?
        } else {
            let warning = format!(
                "code of '{}' is missing from {}; its migrations are forgotten without rollback",
                slug, code_location
            );
            log::warn!("{}", warning);
            warnings.push(warning);
            Vec::new()
        };

        let migrations = self.ctx.registry.transaction(|tx| -> Result<RollbackSummary> {
            let summary = tx.rollback_migrations(slug, &scripts)?;
            tx.delete(slug)?;
            Ok(summary)
        })?;
        if !migrations.forgotten.is_empty() {
            warnings.push(format!(
                "migrations of '{}' without down scripts were not reverted: {}",
                slug,
                migrations.forgotten.join(", ")
            ));
        }

        let assets_removed = match store.unpublish_assets(record.kind.asset_location(), slug) {
            Ok(removed) => removed,
            Err(e) => {
                let warning = format!("published assets of '{}' were not removed: {}", slug, e);
                log::warn!("{}", warning);
                warnings.push(warning);
                false
            }
        };

        match record.kind {
            PackageKind::Theme => self.ctx.invalidate(&[CacheScope::Views]),
            PackageKind::Plugin => self.ctx.invalidate(&CacheScope::ALL),
        }
        log::info!("Uninstalled {} '{}' {}", record.kind, slug, record.version);

        Ok(UninstallReport {
            slug: slug.to_string(),
            kind: record.kind,
            version: record.version,
            hook,
            migrations,
            assets_removed,
            warnings,
        })
    }
}
