//! # Extkit Package System Errors
//!
//! [`PackageError`] is what every lifecycle operation fails with. Its
//! [`ErrorKind`] is the class reported to callers through
//! [`OperationResult`](crate::package_system::result::OperationResult).
//! [`ManifestError`] and [`HookError`] are the narrower errors of the
//! manifest loader and of package lifecycle hooks.
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::registry::error::RegistryError;
use crate::storage::error::StorageSystemError;

/// Failure class exposed at the operation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Io,
    Migration,
    Registry,
    Internal,
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Package '{slug}' not found: {message}")]
    NotFound { slug: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("I/O failure: {0}")]
    Io(#[from] StorageSystemError),

    #[error("Migration failed: {0}")]
    Migration(#[source] RegistryError),

    #[error("Registry failure: {0}")]
    Registry(#[source] RegistryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PackageError {
    pub fn not_found(slug: &str, message: impl Into<String>) -> Self {
        PackageError::NotFound {
            slug: slug.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PackageError::NotFound { .. } => ErrorKind::NotFound,
            PackageError::Validation(_) => ErrorKind::Validation,
            PackageError::Conflict(_) => ErrorKind::Conflict,
            PackageError::Io(_) => ErrorKind::Io,
            PackageError::Migration(_) => ErrorKind::Migration,
            PackageError::Registry(_) => ErrorKind::Registry,
            PackageError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<RegistryError> for PackageError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Migration { .. } => PackageError::Migration(err),
            other => PackageError::Registry(other),
        }
    }
}

impl From<ManifestError> for PackageError {
    fn from(err: ManifestError) -> Self {
        PackageError::Validation(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found at '{0}'")]
    NotFound(PathBuf),

    #[error("Invalid manifest '{path}': {message}")]
    Invalid { path: PathBuf, message: String },
}

impl ManifestError {
    pub fn invalid(path: &std::path::Path, message: impl Into<String>) -> Self {
        ManifestError::Invalid {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Error returned by a package's lifecycle hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("I/O error in lifecycle hook: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand for results of package operations
pub type Result<T> = std::result::Result<T, PackageError>;
