//! # Extkit Package System
//!
//! Lifecycle of zip-distributed plugin and theme packages: upload into
//! staging, install with migrations and hooks, enable/disable, theme
//! activation, uninstall and drift repair.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`manager`]**: the [`PackageManager`] facade. Every operation runs
//!   under a per-slug lock ([`locks`]) and reports an [`OperationResult`].
//! - **[`manifest`]**: `plugin.json` parsing ([`ManifestLoader`]) and slug
//!   normalization.
//! - **[`dependency`]**: presence-and-enabled checks of declared
//!   dependencies, with advisory [`version`] constraint evaluation.
//! - **[`importer`]**, **[`installer`]**, **[`uninstaller`]**, **[`toggle`]**,
//!   **[`theme`]**, **[`scaffold`]**: the individual operations.
//! - **[`lifecycle`]**: the [`Lifecycle`] hook trait and the explicit
//!   [`HookRegistry`] packages are resolved through.
//! - **[`reconcile`]**: registry/filesystem drift detection and recovery of
//!   interrupted operations from their pending markers.
//! - **[`cache`]**: the [`CacheInvalidator`] seam towards the host application.
//!
//! Filesystem moves are bracketed by a pending marker in the registry. The
//! marker is removed in the same transaction that commits the registry
//! change, so a surviving marker always describes an operation that must be
//! rolled back.
pub mod cache;
pub mod context;
pub mod dependency;
pub mod error;
pub mod importer;
pub mod installer;
pub mod lifecycle;
pub mod listing;
pub mod locks;
pub mod manager;
pub mod manifest;
pub mod reconcile;
pub mod result;
pub mod scaffold;
pub mod theme;
pub mod toggle;
pub mod uninstaller;
pub mod version;

pub use cache::{CacheInvalidator, CacheScope, LogCacheInvalidator, RecordingCacheInvalidator};
pub use context::PackageContext;
pub use dependency::{DependencyCheck, DependencyResolver, PackageDependency};
pub use error::{ErrorKind, HookError, ManifestError, PackageError};
pub use lifecycle::{HookContext, HookOutcome, HookPhase, HookRegistry, Lifecycle};
pub use manager::{DefaultPackageManager, PackageManager};
pub use manifest::{Manifest, ManifestLoader};
pub use reconcile::{DriftReport, ReconcileReport, Reconciler};
pub use result::OperationResult;
pub use version::VersionRange;

#[cfg(test)]
mod tests;
