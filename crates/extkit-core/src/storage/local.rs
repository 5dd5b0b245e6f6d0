use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::storage::error::{Result, StorageSystemError};
use crate::storage::provider::StorageProvider;
use crate::utils;

/// Local filesystem storage provider
#[derive(Clone)]
pub struct LocalStorageProvider {
    base_path: PathBuf,
}

impl LocalStorageProvider {
    /// Create a new local storage provider with the given base path
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// The root every relative path is resolved against
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.base_path.join(path)
    }
}

impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.resolve_path(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.resolve_path(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.resolve_path(path).is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path).map_err(|e| StorageSystemError::io(e, "create_dir_all", full_path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let full_path = self.resolve_path(path);
        fs::read_to_string(&full_path).map_err(|e| StorageSystemError::io(e, "read_to_string", full_path))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<()> {
        self.write_bytes(path, contents.as_bytes())
    }

    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let full_path = self.resolve_path(path);
        let parent = full_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StorageSystemError::InvalidPath {
                path: full_path.clone(),
                reason: "cannot write to a path without a parent directory".to_string(),
            })?;
        fs::create_dir_all(&parent).map_err(|e| StorageSystemError::io(e, "create_dir_all", parent.clone()))?;

        // Write next to the target, then persist over it atomically
        let mut temp_file = NamedTempFile::new_in(&parent)
            .map_err(|e| StorageSystemError::io(e, "create_temp_file", parent.clone()))?;
        temp_file
            .write_all(contents)
            .map_err(|e| StorageSystemError::io(e, "write_to_temp_file", temp_file.path().to_path_buf()))?;
        temp_file
            .persist(&full_path)
            .map_err(|e| StorageSystemError::io(e.error, "persist_temp_file", full_path.clone()))?;

        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let full_from = self.resolve_path(from);
        let full_to = self.resolve_path(to);
        if full_to.exists() {
            return Err(StorageSystemError::ResourceExists(full_to));
        }
        if let Some(parent) = full_to.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageSystemError::io(e, "create_dir_all", parent))?;
        }

        match fs::rename(&full_from, &full_to) {
            Ok(()) => Ok(()),
            Err(rename_err) if full_from.is_dir() => {
                // Stores may live on different mounts; fall back to copy + delete.
                log::debug!(
                    "rename {} -> {} failed ({}), falling back to copy",
                    full_from.display(),
                    full_to.display(),
                    rename_err
                );
                if let Err(copy_err) = utils::copy_dir_all(&full_from, &full_to) {
                    let _ = fs::remove_dir_all(&full_to);
                    return Err(StorageSystemError::io(copy_err, "rename_copy_fallback", full_from));
                }
                fs::remove_dir_all(&full_from).map_err(|e| StorageSystemError::io(e, "rename_remove_source", full_from))
            }
            Err(e) => Err(StorageSystemError::io(e, "rename", full_from)),
        }
    }

    fn copy_dir_all(&self, from: &Path, to: &Path) -> Result<u64> {
        let full_from = self.resolve_path(from);
        let full_to = self.resolve_path(to);
        if !full_from.is_dir() {
            return Err(StorageSystemError::DirectoryNotFound(full_from));
        }
        utils::copy_dir_all(&full_from, &full_to).map_err(|e| StorageSystemError::io(e, "copy_dir_all", full_from))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::remove_dir_all(&full_path).map_err(|e| StorageSystemError::io(e, "remove_dir_all", full_path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let full_path = self.resolve_path(path);
        let entries = fs::read_dir(&full_path).map_err(|e| StorageSystemError::io(e, "read_dir", full_path.clone()))?;
        let mut result = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StorageSystemError::io(e, "read_dir_entry", full_path.clone()))?;
            let path = entry.path();

            // Convert back to a relative path if possible
            match path.strip_prefix(&self.base_path) {
                Ok(rel_path) => result.push(rel_path.to_path_buf()),
                Err(_) => result.push(path),
            }
        }

        result.sort();
        Ok(result)
    }
}

impl fmt::Debug for LocalStorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorageProvider")
            .field("base_path", &self.base_path)
            .finish()
    }
}
