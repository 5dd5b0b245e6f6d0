//! # Extkit Package Registry
//!
//! Durable record of installed plugins and themes, backed by SQLite.
//!
//! ## Tables
//!
//! - **`installed_packages`**: one [`InstalledRecord`] per slug. A partial
//!   unique index guarantees that at most one theme is enabled.
//! - **`package_migrations`**: which schema scripts of which package ran, in
//!   numbered batches (see [`migrations`]).
//! - **`pending_operations`**: [`PendingOperation`] markers for filesystem
//!   moves whose registry half has not committed yet.
//!
//! Every mutation goes through [`PackageRegistry::transaction`], which hands
//! the closure a [`RegistryTx`] and commits only when the closure succeeds.
pub mod database;
pub mod error;
pub mod migrations;
pub mod pending;
pub mod record;

pub use database::{PackageRegistry, RegistryTx};
pub use error::RegistryError;
pub use migrations::{discover_migrations, AppliedMigration, MigrationScript, RollbackSummary};
pub use pending::{PendingKind, PendingOperation, PendingPhase};
pub use record::{InstalledRecord, PackageKind};

#[cfg(test)]
mod tests;
