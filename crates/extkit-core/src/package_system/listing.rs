use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::package_system::context::PackageContext;
use crate::package_system::error::Result;
use crate::package_system::manifest::{Manifest, ManifestLoader};
use crate::registry::{InstalledRecord, PackageKind};
use crate::storage::Location;

#[derive(Debug, Clone, Serialize)]
pub struct AvailablePlugin {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub dependencies: BTreeMap<String, String>,
    pub installed: bool,
    pub enabled: bool,
    /// Whether the code directory is where the record expects it
    pub has_code: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StagedPackage {
    pub slug: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub is_upgrade: bool,
    pub current_version: Option<String>,
    pub manifest_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisabledPackage {
    pub slug: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub registered: bool,
    pub manifest_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemeEntry {
    pub slug: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub installed: bool,
    pub active: bool,
    pub manifest_error: Option<String>,
}

/// Read-only views over the registry and the stores.
pub struct Listings<'a> {
    ctx: &'a PackageContext,
}

impl<'a> Listings<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    /// Registered plugins plus unregistered directories in the active store
    pub fn available(&self) -> Result<Vec<AvailablePlugin>> {
        let store = &self.ctx.store;
        let mut plugins: BTreeMap<String, AvailablePlugin> = BTreeMap::new();

        for record in self.ctx.registry.list(Some(PackageKind::Plugin))? {
            let has_code = store.contains(record.code_location(), &record.slug);
            plugins.insert(
                record.slug.clone(),
                AvailablePlugin {
                    slug: record.slug,
                    name: record.name,
                    version: record.version,
                    description: record.description,
                    author: record.author,
                    dependencies: record.dependencies,
                    installed: true,
                    enabled: record.enabled,
                    has_code,
                },
            );
        }

        for slug in store.list(Location::Active)? {
            if plugins.contains_key(&slug) {
                continue;
            }
            let manifest = self.manifest(Location::Active, &slug).ok();
            plugins.insert(
                slug.clone(),
                AvailablePlugin {
                    name: manifest.as_ref().map(|m| m.name.clone()).unwrap_or_else(|| slug.clone()),
                    version: manifest.as_ref().map(|m| m.version.clone()).unwrap_or_default(),
                    description: manifest.as_ref().map(|m| m.description.clone()).unwrap_or_default(),
                    author: manifest.as_ref().map(|m| m.author.clone()).unwrap_or_default(),
                    dependencies: manifest.map(|m| m.dependencies).unwrap_or_default(),
                    slug,
                    installed: false,
                    enabled: false,
                    has_code: true,
                },
            );
        }

        Ok(plugins.into_values().collect())
    }

    pub fn staging(&self) -> Result<Vec<StagedPackage>> {
        let records = self.records_by_slug()?;
        let mut staged = Vec::new();
        for slug in self.ctx.store.list(Location::Staging)? {
            let current = records.get(&slug);
            let (manifest, manifest_error) = split(self.manifest(Location::Staging, &slug));
            staged.push(StagedPackage {
                name: manifest.as_ref().map(|m| m.name.clone()),
                version: manifest.map(|m| m.version),
                is_upgrade: current.is_some(),
                current_version: current.map(|r| r.version.clone()),
                manifest_error,
                slug,
            });
        }
        Ok(staged)
    }

    pub fn disabled(&self) -> Result<Vec<DisabledPackage>> {
        let records = self.records_by_slug()?;
        let mut disabled = Vec::new();
        for slug in self.ctx.store.list(Location::Disabled)? {
            let (manifest, manifest_error) = split(self.manifest(Location::Disabled, &slug));
            disabled.push(DisabledPackage {
                name: manifest.as_ref().map(|m| m.name.clone()),
                version: manifest.map(|m| m.version),
                registered: records.contains_key(&slug),
                manifest_error,
                slug,
            });
        }
        Ok(disabled)
    }

    pub fn themes(&self) -> Result<Vec<ThemeEntry>> {
        let records = self.records_by_slug()?;
        let mut themes = Vec::new();
        for slug in self.ctx.store.list(Location::Themes)? {
            let record = records.get(&slug).filter(|r| r.is_theme());
            let (manifest, manifest_error) = split(self.manifest(Location::Themes, &slug));
            themes.push(ThemeEntry {
                name: manifest.as_ref().map(|m| m.name.clone()),
                version: manifest.map(|m| m.version),
                installed: record.is_some(),
                active: record.map(|r| r.enabled).unwrap_or(false),
                manifest_error,
                slug,
            });
        }
        Ok(themes)
    }

    fn records_by_slug(&self) -> Result<HashMap<String, InstalledRecord>> {
        Ok(self
            .ctx
            .registry
            .list(None)?
            .into_iter()
            .map(|r| (r.slug.clone(), r))
            .collect())
    }

    fn manifest(&self, location: Location, slug: &str) -> std::result::Result<Manifest, String> {
        let dir = self.ctx.store.absolute_package_path(location, slug);
        ManifestLoader::load_dir(&dir, self.ctx.store.manifest_file()).map_err(|e| e.to_string())
    }
}

fn split(manifest: std::result::Result<Manifest, String>) -> (Option<Manifest>, Option<String>) {
    match manifest {
        Ok(manifest) => (Some(manifest), None),
        Err(e) => (None, Some(e)),
    }
}
