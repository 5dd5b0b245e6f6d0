//! Zip package archives.
//!
//! A package archive holds exactly one top-level directory. Extraction strips
//! that directory and writes its contents under a caller-chosen root, so the
//! on-disk directory always carries the canonical slug.
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::storage::error::{Result, StorageSystemError};

/// Finder metadata folders that macOS adds to zip files
const IGNORED_ROOTS: &[&str] = &["__MACOSX"];

pub struct PackageArchive<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> PackageArchive<'a> {
    /// Open an in-memory archive; corrupt data is an archive error
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| StorageSystemError::archive(e, "open"))?;
        Ok(Self { archive })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Name of the single top-level directory, exactly as stored in the archive
    pub fn top_level_dir(&mut self) -> Result<String> {
        let mut roots = BTreeSet::new();

        for index in 0..self.archive.len() {
            let entry = self
                .archive
                .by_index(index)
                .map_err(|e| StorageSystemError::archive(e, "read_entry"))?;
            let path = entry_path(entry.enclosed_name().map(|p| p.to_path_buf()), entry.name())?;
            let Some(root) = first_component(&path) else {
                continue;
            };
            if IGNORED_ROOTS.contains(&root.as_str()) {
                continue;
            }
            if path.components().count() == 1 && !entry.is_dir() {
                return Err(StorageSystemError::ArchiveLayout(format!(
                    "file '{}' sits at the archive root; packages must be wrapped in a single directory",
                    root
                )));
            }
            roots.insert(root);
        }

        let mut roots = roots.into_iter();
        match (roots.next(), roots.next()) {
            (Some(root), None) => Ok(root),
            (None, _) => Err(StorageSystemError::ArchiveLayout("archive contains no package directory".to_string())),
            (Some(first), Some(second)) => Err(StorageSystemError::ArchiveLayout(format!(
                "archive must contain a single top-level directory, found '{}' and '{}'",
                first, second
            ))),
        }
    }

    /// Extract the contents of `top_level` into `destination`.
    ///
    /// `destination` must not exist yet. Returns the number of files written.
    pub fn extract_into(&mut self, top_level: &str, destination: &Path) -> Result<u64> {
        if destination.exists() {
            return Err(StorageSystemError::ResourceExists(destination.to_path_buf()));
        }
        fs::create_dir_all(destination).map_err(|e| StorageSystemError::io(e, "create_dir_all", destination))?;

        let mut written = 0;
        for index in 0..self.archive.len() {
            let mut entry = self
                .archive
                .by_index(index)
                .map_err(|e| StorageSystemError::archive(e, "read_entry"))?;
            let path = entry_path(entry.enclosed_name().map(|p| p.to_path_buf()), entry.name())?;
            let Ok(relative) = path.strip_prefix(top_level) else {
                // Ignored roots such as __MACOSX
                continue;
            };
            if relative.as_os_str().is_empty() {
                continue;
            }

            let target = destination.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| StorageSystemError::io(e, "create_dir_all", target.clone()))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| StorageSystemError::io(e, "create_dir_all", parent))?;
            }
            let mut out = File::create(&target).map_err(|e| StorageSystemError::io(e, "create_file", target.clone()))?;
            io::copy(&mut entry, &mut out).map_err(|e| StorageSystemError::io(e, "extract_entry", target.clone()))?;
            written += 1;
        }

        Ok(written)
    }
}

fn entry_path(enclosed: Option<PathBuf>, raw_name: &str) -> Result<PathBuf> {
    let path = enclosed.ok_or_else(|| StorageSystemError::InvalidPath {
        path: PathBuf::from(raw_name),
        reason: "archive entry escapes the package root".to_string(),
    })?;
    if path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(StorageSystemError::InvalidPath {
            path,
            reason: "archive entry is not a plain relative path".to_string(),
        });
    }
    Ok(path)
}

fn first_component(path: &Path) -> Option<String> {
    path.components().next().and_then(|c| match c {
        Component::Normal(name) => name.to_str().map(str::to_string),
        _ => None,
    })
}
