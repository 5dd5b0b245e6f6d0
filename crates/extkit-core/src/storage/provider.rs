use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::storage::error::Result;

/// Trait for storage providers that hold package trees on disk
pub trait StorageProvider: Send + Sync + Debug {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Absolute location of a provider-relative path
    fn resolve(&self, path: &Path) -> PathBuf;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory and all its parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read a file to a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write a string to a file, replacing it atomically
    fn write_string(&self, path: &Path, contents: &str) -> Result<()>;

    /// Write bytes to a file, replacing it atomically
    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Move a file or directory from one path to another
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Recursively copy a directory tree
    fn copy_dir_all(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Remove a directory and all its contents
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory, relative to the provider root
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}
