use serde::Serialize;

use crate::package_system::context::PackageContext;
use crate::package_system::error::{PackageError, Result};
use crate::package_system::manifest::{normalize_slug, ManifestLoader};
use crate::registry::PackageKind;
use crate::storage::error::StorageSystemError;
use crate::storage::{Location, PackageArchive};

/// Returned by a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub is_upgrade: bool,
    pub current_version: Option<String>,
    pub new_version: String,
    pub files: u64,
}

/// Accepts zip packages into staging (plugins) or the themes root (themes).
pub struct PackageImporter<'a> {
    ctx: &'a PackageContext,
}

impl<'a> PackageImporter<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    /// Canonical slug of an archive, without extracting anything
    pub fn peek_slug(bytes: &[u8]) -> Result<String> {
        let mut archive = PackageArchive::open(bytes)?;
        let top_level = archive.top_level_dir().map_err(layout_error)?;
        normalize_slug(&top_level)
    }

    pub fn upload(&self, bytes: &[u8], kind: PackageKind) -> Result<UploadReport> {
        let mut archive = PackageArchive::open(bytes)?;
        let top_level = archive.top_level_dir().map_err(layout_error)?;
        let slug = normalize_slug(&top_level)?;

        let destination = kind.upload_location();
        if self.ctx.store.contains(destination, &slug) {
            return Err(PackageError::Conflict(match kind {
                PackageKind::Plugin => format!("'{}' is already in staging", slug),
                PackageKind::Theme => format!("theme '{}' is already installed", slug),
            }));
        }

        let existing = self.ctx.registry.find(&slug)?;
        if let Some(record) = &existing {
            if record.kind != kind {
                return Err(PackageError::Conflict(format!(
                    "'{}' is already registered as a {}",
                    slug, record.kind
                )));
            }
        }

        let target = self.ctx.store.absolute_package_path(destination, &slug);
        let files = match archive.extract_into(&top_level, &target) {
            Ok(files) => files,
            Err(e) => {
                self.discard(destination, &slug);
                return Err(layout_error(e));
            }
        };

        let manifest = match ManifestLoader::load_dir(&target, self.ctx.store.manifest_file()) {
            Ok(manifest) => manifest,
            Err(e) => {
                self.discard(destination, &slug);
                return Err(PackageError::Validation(format!("upload of '{}' rejected: {}", slug, e)));
            }
        };
        if let Err(e) = manifest.verify_slug(&slug) {
            self.discard(destination, &slug);
            return Err(e);
        }

        log::info!(
            "Uploaded {} '{}' {} into {} ({} files)",
            kind,
            slug,
            manifest.version,
            destination,
            files
        );
        Ok(UploadReport {
            is_upgrade: existing.is_some(),
            current_version: existing.map(|r| r.version),
            new_version: manifest.version,
            slug,
            kind,
            files,
        })
    }

    /// Delete a staged package
    pub fn remove_staged(&self, slug: &str) -> Result<()> {
        if !self.ctx.store.contains(Location::Staging, slug) {
            return Err(PackageError::not_found(slug, "not present in staging"));
        }
        self.ctx.store.remove_package(Location::Staging, slug)?;
        log::info!("Removed '{}' from staging", slug);
        Ok(())
    }

    fn discard(&self, location: Location, slug: &str) {
        if !self.ctx.store.contains(location, slug) {
            return;
        }
        if let Err(e) = self.ctx.store.remove_package(location, slug) {
            log::warn!("Could not clean up rejected upload '{}' in {}: {}", slug, location, e);
        }
    }
}

/// Layout problems are caller mistakes, everything else stays an I/O failure
fn layout_error(err: StorageSystemError) -> PackageError {
    match err {
        StorageSystemError::ArchiveLayout(message) => PackageError::Validation(message),
        e @ StorageSystemError::InvalidPath { .. } => PackageError::Validation(e.to_string()),
        e @ StorageSystemError::ResourceExists(_) => PackageError::Conflict(e.to_string()),
        other => PackageError::Io(other),
    }
}
