//! # Extkit Storage Errors
//!
//! Defines [`StorageSystemError`], the error type for every filesystem-facing
//! operation: provider I/O, archive extraction, path validation and
//! configuration (de)serialization.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found at path: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Resource already exists and overwrite is not permitted: {0}")]
    ResourceExists(PathBuf),

    #[error("Invalid path provided: '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Archive error during '{operation}': {source}")]
    Archive {
        operation: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Invalid archive layout: {0}")]
    ArchiveLayout(String),

    #[error("Serialization to '{format}' failed: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed: {source}")]
    DeserializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedConfigFormat(String),
}

// Helper for creating Io errors, ensuring path is always included.
impl StorageSystemError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        StorageSystemError::Io {
            source,
            operation: operation.into(),
            path: path.into(),
        }
    }

    pub fn archive(source: zip::result::ZipError, operation: impl Into<String>) -> Self {
        StorageSystemError::Archive {
            operation: operation.into(),
            source,
        }
    }
}

/// Shorthand for results of storage operations
pub type Result<T> = std::result::Result<T, StorageSystemError>;
