use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::kernel::constants;
use crate::package_system::context::PackageContext;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::manifest::Manifest;
use crate::storage::Location;

#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldReport {
    pub slug: String,
    pub name: String,
    /// Provider-relative directory of the new package
    pub path: PathBuf,
    /// Files written, relative to the package root
    pub files: Vec<String>,
}

/// Generates an empty plugin skeleton in staging.
pub struct Scaffolder<'a> {
    ctx: &'a PackageContext,
}

impl<'a> Scaffolder<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    pub fn scaffold(&self, slug: &str, name: &str) -> Result<ScaffoldReport> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PackageError::Validation(format!("scaffold of '{}' needs a display name", slug)));
        }

        let store = &self.ctx.store;
        for location in [Location::Staging, Location::Active, Location::Disabled] {
            if store.contains(location, slug) {
                return Err(PackageError::Conflict(format!("'{}' already exists in {}", slug, location)));
            }
        }
        if self.ctx.registry.find(slug)?.is_some() {
            return Err(PackageError::Conflict(format!("'{}' is already installed", slug)));
        }

        let mut manifest = Manifest::new(name, constants::SCAFFOLD_VERSION);
        manifest.slug = Some(slug.to_string());

        let manifest_file = store.manifest_file().to_string();
        let keep_migrations = format!("{}/.gitkeep", constants::MIGRATIONS_DIR);
        let keep_assets = format!("{}/.gitkeep", constants::ASSETS_DIR);

        store.write_package_file(Location::Staging, slug, Path::new(&manifest_file), &manifest.to_json_pretty()?)?;
        store.create_package_dir(Location::Staging, slug, Path::new(constants::MIGRATIONS_DIR))?;
        store.write_package_file(Location::Staging, slug, Path::new(&keep_migrations), "")?;
        store.create_package_dir(Location::Staging, slug, Path::new(constants::ASSETS_DIR))?;
        store.write_package_file(Location::Staging, slug, Path::new(&keep_assets), "")?;

        log::info!("Scaffolded '{}' in staging", slug);
        Ok(ScaffoldReport {
            slug: slug.to_string(),
            name: name.to_string(),
            path: store.package_path(Location::Staging, slug),
            files: vec![manifest_file, keep_migrations, keep_assets],
        })
    }
}
