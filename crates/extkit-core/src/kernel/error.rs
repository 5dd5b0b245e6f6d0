//! # Extkit Kernel Errors
//!
//! [`Error`] is the crate-wide error. Each subsystem keeps its own typed error
//! ([`PackageError`], [`RegistryError`], [`StorageSystemError`]) and the kernel
//! wraps them, adding lifecycle and component registry failures of its own.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::package_system::error::PackageError;
use crate::registry::error::RegistryError;
use crate::storage::error::StorageSystemError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Package system error: {0}")]
    PackageSystem(#[from] PackageError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase:?}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Error related to component registration or lookup.
    #[error("Component registry error during operation '{operation}': {message}")]
    ComponentRegistryError {
        operation: String,
        component_name: Option<String>,
        message: String,
    },

    #[error("Error: {0}")]
    Other(String),
}

/// Phase of the application lifecycle an error happened in.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Recovery")]
    Recovery,
    #[error("RunPreCheck")]
    RunPreCheck,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    pub(crate) fn lifecycle(phase: KernelLifecyclePhase, component: &str, message: impl Into<String>, source: Error) -> Self {
        Error::KernelLifecycleError {
            phase,
            component_name: Some(component.to_string()),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
