//! # Extkit Registry Errors
//!
//! [`RegistryError`] covers failures of the SQLite-backed package registry:
//! opening the database, statement failures, per-package schema migrations
//! and rows that no longer decode.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Cannot open registry database at '{path}': {message}")]
    Open { path: PathBuf, message: String },

    #[error("Registry database error during '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Migration '{migration}' of '{slug}' failed: {source}")]
    Migration {
        slug: String,
        migration: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Registry record '{slug}' is corrupt: {message}")]
    Corrupt { slug: String, message: String },

    #[error("Registry connection lock poisoned")]
    Poisoned,
}

impl RegistryError {
    /// Adapter for `map_err` that tags a database error with its operation
    pub fn db(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> RegistryError {
        move |source| RegistryError::Database {
            operation: operation.to_string(),
            source,
        }
    }
}

/// Shorthand for results of registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
