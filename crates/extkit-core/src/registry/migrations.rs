//! Per-package schema migrations.
//!
//! A package ships SQL scripts under `database/migrations`. A script named
//! `<name>.up.sql` (or plain `<name>.sql`) applies a migration and an optional
//! `<name>.down.sql` reverses it. Scripts run in lexical order of `<name>` and
//! must not open or close transactions themselves; they always execute inside
//! the registry transaction of the operation that triggered them.
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use crate::kernel::constants;
use crate::registry::database::RegistryTx;
use crate::registry::error::{RegistryError, Result};
use crate::storage::error::StorageSystemError;
use crate::utils;

/// One migration of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub name: String,
    pub up: String,
    pub down: Option<String>,
}

/// Row of the `package_migrations` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub migration: String,
    pub batch: i64,
    pub applied_at: DateTime<Utc>,
}

/// Outcome of rolling a package's migrations back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    /// Migrations whose down script ran
    pub rolled_back: Vec<String>,
    /// Applied migrations without a down script, only removed from the log
    pub forgotten: Vec<String>,
}

/// Collect the migration scripts of the package rooted at `package_dir`.
///
/// A missing migrations directory yields an empty list.
pub fn discover_migrations(package_dir: &Path) -> std::result::Result<Vec<MigrationScript>, StorageSystemError> {
    let dir = package_dir.join(constants::MIGRATIONS_DIR);
    let files = utils::find_files_with_extension(&dir, "sql")
        .map_err(|e| StorageSystemError::io(e, "discover_migrations", dir.clone()))?;

    let mut scripts: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for file in files {
        if file.parent() != Some(dir.as_path()) {
            continue;
        }
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let body = std::fs::read_to_string(&file).map_err(|e| StorageSystemError::io(e, "read_migration", file.clone()))?;

        if let Some(name) = stem.strip_suffix(".down") {
            scripts.entry(name.to_string()).or_default().1 = Some(body);
        } else {
            let name = stem.strip_suffix(".up").unwrap_or(stem);
            scripts.entry(name.to_string()).or_default().0 = Some(body);
        }
    }

    let mut result = Vec::with_capacity(scripts.len());
    for (name, (up, down)) in scripts {
        match up {
            Some(up) => result.push(MigrationScript { name, up, down }),
            None => log::warn!(
                "Ignoring migration '{}' in {}: it has a down script but no up script",
                name,
                dir.display()
            ),
        }
    }
    Ok(result)
}

impl RegistryTx<'_> {
    /// Migrations recorded for `slug`, oldest first
    pub fn applied_migrations(&self, slug: &str) -> Result<Vec<AppliedMigration>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT migration, batch, applied_at FROM package_migrations
                 WHERE slug = ?1 ORDER BY batch, migration",
            )
            .map_err(RegistryError::db("applied_migrations"))?;
        let rows = stmt
            .query_map(params![slug], |row| {
                Ok(AppliedMigration {
                    migration: row.get(0)?,
                    batch: row.get(1)?,
                    applied_at: row.get(2)?,
                })
            })
            .map_err(RegistryError::db("applied_migrations"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(RegistryError::db("applied_migrations"))
    }

    /// Apply every script not yet recorded for `slug` as one new batch.
    ///
    /// Returns the names of the migrations that ran.
    pub fn apply_migrations(&self, slug: &str, scripts: &[MigrationScript]) -> Result<Vec<String>> {
        let applied: Vec<String> = self
            .applied_migrations(slug)?
            .into_iter()
            .map(|m| m.migration)
            .collect();
        let pending: Vec<&MigrationScript> = scripts
            .iter()
            .filter(|script| !applied.contains(&script.name))
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let batch: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(batch), 0) + 1 FROM package_migrations WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .map_err(RegistryError::db("next_batch"))?;

        let mut ran = Vec::with_capacity(pending.len());
        for script in pending {
            log::debug!("Running migration '{}' for '{}'", script.name, slug);
            self.conn
                .execute_batch(&script.up)
                .map_err(|source| RegistryError::Migration {
                    slug: slug.to_string(),
                    migration: script.name.clone(),
                    source,
                })?;
            self.conn
                .execute(
                    "INSERT INTO package_migrations (slug, migration, batch, applied_at) VALUES (?1, ?2, ?3, ?4)",
                    params![slug, script.name, batch, Utc::now()],
                )
                .map_err(RegistryError::db("record_migration"))?;
            ran.push(script.name.clone());
        }
        Ok(ran)
    }

    /// Reverse every migration recorded for `slug`, newest first.
    ///
    /// Recorded migrations without a matching down script are dropped from
    /// the log with a warning.
    pub fn rollback_migrations(&self, slug: &str, scripts: &[MigrationScript]) -> Result<RollbackSummary> {
        let mut applied = self.applied_migrations(slug)?;
        applied.reverse();

        let mut summary = RollbackSummary::default();
        for record in applied {
            let down = scripts
                .iter()
                .find(|script| script.name == record.migration)
                .and_then(|script| script.down.as_deref());
            match down {
                Some(sql) => {
                    log::debug!("Rolling back migration '{}' for '{}'", record.migration, slug);
                    self.conn
                        .execute_batch(sql)
                        .map_err(|source| RegistryError::Migration {
                            slug: slug.to_string(),
                            migration: record.migration.clone(),
                            source,
                        })?;
                    summary.rolled_back.push(record.migration);
                }
                None => {
                    log::warn!(
                        "Migration '{}' of '{}' has no down script; forgetting it without reverting",
                        record.migration,
                        slug
                    );
                    summary.forgotten.push(record.migration);
                }
            }
        }

        self.conn
            .execute("DELETE FROM package_migrations WHERE slug = ?1", params![slug])
            .map_err(RegistryError::db("forget_migrations"))?;
        Ok(summary)
    }
}
