use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::storage::config::ManagerConfig;
use crate::storage::error::Result;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;
use crate::utils;

/// Named locations of the filesystem store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Code for enabled plugins
    Active,
    /// Uploaded, not yet installed plugins
    Staging,
    /// Code for installed but disabled plugins
    Disabled,
    /// Timestamped snapshots
    Backups,
    /// Theme packages (no staging step)
    Themes,
    /// Published plugin assets
    PublicPlugins,
    /// Published theme assets
    PublicThemes,
}

impl Location {
    pub const ALL: [Location; 7] = [
        Location::Active,
        Location::Staging,
        Location::Disabled,
        Location::Backups,
        Location::Themes,
        Location::PublicPlugins,
        Location::PublicThemes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Active => "active",
            Location::Staging => "staging",
            Location::Disabled => "disabled",
            Location::Backups => "backups",
            Location::Themes => "themes",
            Location::PublicPlugins => "public_plugins",
            Location::PublicThemes => "public_themes",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package-aware view over a [`StorageProvider`].
///
/// Every package lives in `<location root>/<slug>`. Slugs are canonical
/// lowercase, so lookups are plain path joins.
#[derive(Clone)]
pub struct PackageStore {
    provider: Arc<dyn StorageProvider>,
    active: PathBuf,
    staging: PathBuf,
    disabled: PathBuf,
    backups: PathBuf,
    themes: PathBuf,
    public_plugins: PathBuf,
    public_themes: PathBuf,
    manifest_file: String,
}

impl PackageStore {
    /// Build a store over an arbitrary provider using the configured layout
    pub fn new(provider: Arc<dyn StorageProvider>, config: &ManagerConfig) -> Self {
        Self {
            provider,
            active: config.plugins_dir.clone(),
            staging: config.staging_dir.clone(),
            disabled: config.disabled_dir.clone(),
            backups: config.backups_dir.clone(),
            themes: config.themes_dir.clone(),
            public_plugins: config.public_dir.join("plugins"),
            public_themes: config.public_dir.join("themes"),
            manifest_file: config.manifest_file.clone(),
        }
    }

    /// Local filesystem store rooted at `config.base_dir`
    pub fn from_config(config: &ManagerConfig) -> Self {
        let provider = Arc::new(LocalStorageProvider::new(config.base_dir.clone())) as Arc<dyn StorageProvider>;
        Self::new(provider, config)
    }

    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    pub fn manifest_file(&self) -> &str {
        &self.manifest_file
    }

    /// Provider-relative root of a location
    pub fn root(&self, location: Location) -> &Path {
        match location {
            Location::Active => &self.active,
            Location::Staging => &self.staging,
            Location::Disabled => &self.disabled,
            Location::Backups => &self.backups,
            Location::Themes => &self.themes,
            Location::PublicPlugins => &self.public_plugins,
            Location::PublicThemes => &self.public_themes,
        }
    }

    pub fn absolute_root(&self, location: Location) -> PathBuf {
        self.provider.resolve(self.root(location))
    }

    /// Provider-relative directory of a package
    pub fn package_path(&self, location: Location, slug: &str) -> PathBuf {
        self.root(location).join(slug)
    }

    pub fn absolute_package_path(&self, location: Location, slug: &str) -> PathBuf {
        self.provider.resolve(&self.package_path(location, slug))
    }

    /// Absolute path of the manifest file of a package
    pub fn manifest_path(&self, location: Location, slug: &str) -> PathBuf {
        self.absolute_package_path(location, slug).join(&self.manifest_file)
    }

    pub fn contains(&self, location: Location, slug: &str) -> bool {
        self.provider.is_dir(&self.package_path(location, slug))
    }

    /// Create every location root
    pub fn ensure_layout(&self) -> Result<()> {
        for location in Location::ALL {
            self.provider.create_dir_all(self.root(location))?;
        }
        Ok(())
    }

    /// Directory names in a location, sorted; hidden entries and files are skipped
    pub fn list(&self, location: Location) -> Result<Vec<String>> {
        let root = self.root(location);
        if !self.provider.is_dir(root) {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in self.provider.read_dir(root)? {
            if !self.provider.is_dir(&entry) {
                continue;
            }
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Move a package directory between locations
    pub fn move_package(&self, slug: &str, from: Location, to: Location) -> Result<()> {
        log::debug!("Moving '{}' from {} to {}", slug, from, to);
        self.provider
            .rename(&self.package_path(from, slug), &self.package_path(to, slug))
    }

    pub fn remove_package(&self, location: Location, slug: &str) -> Result<()> {
        log::debug!("Removing '{}' from {}", slug, location);
        self.provider.remove_dir_all(&self.package_path(location, slug))
    }

    /// Copy a package into a fresh timestamped backup directory.
    ///
    /// Returns the provider-relative backup path.
    pub fn snapshot(&self, location: Location, slug: &str, label: &str) -> Result<PathBuf> {
        let target = self.next_backup_path(slug, label);
        let files = self
            .provider
            .copy_dir_all(&self.package_path(location, slug), &target)?;
        let bytes = utils::dir_size(self.provider.resolve(&target)).unwrap_or(0);
        log::info!(
            "Backed up '{}' from {} to {} ({} files, {} bytes)",
            slug,
            location,
            target.display(),
            files,
            bytes
        );
        Ok(target)
    }

    /// Move a package out of the way into the backups location.
    ///
    /// Used instead of deleting a directory that occupies a destination.
    pub fn set_aside(&self, location: Location, slug: &str, label: &str) -> Result<PathBuf> {
        let target = self.next_backup_path(slug, label);
        self.provider
            .rename(&self.package_path(location, slug), &target)?;
        log::warn!(
            "Moved existing '{}' out of {} to {}",
            slug,
            location,
            target.display()
        );
        Ok(target)
    }

    /// Copy a backup back into place; the backup itself is kept
    pub fn restore_snapshot(&self, backup: &Path, location: Location, slug: &str) -> Result<()> {
        let destination = self.package_path(location, slug);
        if self.provider.exists(&destination) {
            self.provider.remove_dir_all(&destination)?;
        }
        self.provider.copy_dir_all(backup, &destination)?;
        log::info!("Restored '{}' into {} from {}", slug, location, backup.display());
        Ok(())
    }

    /// Publish `<package>/assets` under the public location, replacing older files.
    ///
    /// Returns the number of copied files, or `None` when the package ships no assets.
    pub fn publish_assets(&self, code: Location, slug: &str, public: Location) -> Result<Option<u64>> {
        let assets = self.package_path(code, slug).join(constants::ASSETS_DIR);
        if !self.provider.is_dir(&assets) {
            return Ok(None);
        }

        let destination = self.package_path(public, slug);
        if self.provider.exists(&destination) {
            self.provider.remove_dir_all(&destination)?;
        }
        let copied = self.provider.copy_dir_all(&assets, &destination)?;
        Ok(Some(copied))
    }

    /// Remove published assets; returns whether anything was removed
    pub fn unpublish_assets(&self, public: Location, slug: &str) -> Result<bool> {
        let destination = self.package_path(public, slug);
        if !self.provider.exists(&destination) {
            return Ok(false);
        }
        self.provider.remove_dir_all(&destination)?;
        Ok(true)
    }

    /// Write a file inside a package directory (relative to the package root)
    pub fn write_package_file(&self, location: Location, slug: &str, relative: &Path, contents: &str) -> Result<()> {
        self.provider
            .write_string(&self.package_path(location, slug).join(relative), contents)
    }

    pub fn create_package_dir(&self, location: Location, slug: &str, relative: &Path) -> Result<()> {
        self.provider
            .create_dir_all(&self.package_path(location, slug).join(relative))
    }

    fn next_backup_path(&self, slug: &str, label: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let base = format!("{}-{}-{}", slug, label, stamp);
        let mut candidate = self.backups.join(&base);
        let mut counter = 1;
        while self.provider.exists(&candidate) {
            candidate = self.backups.join(format!("{}-{}", base, counter));
            counter += 1;
        }
        candidate
    }
}

impl fmt::Debug for PackageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageStore")
            .field("provider", &self.provider.name())
            .field("active", &self.active)
            .field("staging", &self.staging)
            .field("disabled", &self.disabled)
            .field("themes", &self.themes)
            .finish_non_exhaustive()
    }
}
