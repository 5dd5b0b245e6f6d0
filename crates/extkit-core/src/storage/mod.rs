//! # Extkit Storage System
//!
//! Filesystem side of the lifecycle manager.
//!
//! - [`StorageProvider`](provider::StorageProvider) abstracts disk access;
//!   [`LocalStorageProvider`](local::LocalStorageProvider) is the default,
//!   rooted at the configured base directory with atomic writes.
//! - [`PackageStore`](store::PackageStore) maps the named [`Location`]s
//!   (active, staging, disabled, backups, themes and the public asset
//!   namespaces) onto provider paths and implements package-level moves,
//!   snapshots and asset publishing.
//! - [`PackageArchive`](archive::PackageArchive) reads uploaded zip packages.
//! - [`ManagerConfig`](config::ManagerConfig) describes the layout and loads
//!   from JSON, YAML or TOML files.
//! - [`DefaultStorageManager`](manager::DefaultStorageManager) is the kernel
//!   component that prepares the layout on startup.
pub mod archive;
pub mod config;
pub mod error;
pub mod local;
pub mod manager;
pub mod provider;
pub mod store;

pub use archive::PackageArchive;
pub use config::{ConfigFormat, ManagerConfig};
pub use error::StorageSystemError;
pub use local::LocalStorageProvider;
pub use manager::DefaultStorageManager;
pub use provider::StorageProvider;
pub use store::{Location, PackageStore};

#[cfg(test)]
mod tests;
