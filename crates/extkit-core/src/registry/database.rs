use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::registry::error::{RegistryError, Result};
use crate::registry::record::{InstalledRecord, PackageKind};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS installed_packages (
    slug         TEXT PRIMARY KEY NOT NULL,
    name         TEXT NOT NULL,
    version      TEXT NOT NULL,
    kind         TEXT NOT NULL CHECK (kind IN ('plugin', 'theme')),
    description  TEXT NOT NULL DEFAULT '',
    author       TEXT NOT NULL DEFAULT '',
    dependencies TEXT NOT NULL DEFAULT '{}',
    config       TEXT NOT NULL DEFAULT '{}',
    enabled      INTEGER NOT NULL DEFAULT 0,
    hook_entry   TEXT,
    installed_at TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS installed_packages_single_active_theme
    ON installed_packages (kind) WHERE kind = 'theme' AND enabled = 1;

CREATE TABLE IF NOT EXISTS package_migrations (
    slug       TEXT NOT NULL,
    migration  TEXT NOT NULL,
    batch      INTEGER NOT NULL,
    applied_at TEXT NOT NULL,
    PRIMARY KEY (slug, migration)
);

CREATE TABLE IF NOT EXISTS pending_operations (
    slug        TEXT PRIMARY KEY NOT NULL,
    operation   TEXT NOT NULL,
    phase       TEXT NOT NULL,
    backup_path TEXT,
    started_at  TEXT NOT NULL
);
"#;

const RECORD_COLUMNS: &str = "slug, name, version, kind, description, author, dependencies, config, enabled, hook_entry, installed_at, updated_at";

/// SQLite-backed registry of installed packages.
///
/// The connection sits behind a mutex and is only ever held for the length
/// of one synchronous closure, never across an await point.
pub struct PackageRegistry {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl PackageRegistry {
    /// Open (or create) the registry database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| RegistryError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(RegistryError::db("busy_timeout"))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Private in-memory registry, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| RegistryError::Open {
            path: PathBuf::from(":memory:"),
            message: e.to_string(),
        })?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, location: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(RegistryError::db("create_schema"))?;
        log::debug!(
            "Package registry ready at {}",
            location
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Run read-only queries against the current committed state
    pub fn read<T, E>(&self, f: impl FnOnce(&RegistryTx<'_>) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<RegistryError>,
    {
        let conn = self.conn.lock().map_err(|_| RegistryError::Poisoned)?;
        f(&RegistryTx { conn: &*conn })
    }

    /// Run `f` inside one SQLite transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err`.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&RegistryTx<'_>) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<RegistryError>,
    {
        let mut conn = self.conn.lock().map_err(|_| RegistryError::Poisoned)?;
        let tx = conn.transaction().map_err(RegistryError::db("begin"))?;
        let value = f(&RegistryTx { conn: &*tx })?;
        tx.commit().map_err(RegistryError::db("commit"))?;
        Ok(value)
    }

    pub fn find(&self, slug: &str) -> Result<Option<InstalledRecord>> {
        self.read(|tx| tx.find(slug))
    }

    pub fn list(&self, kind: Option<PackageKind>) -> Result<Vec<InstalledRecord>> {
        self.read(|tx| tx.list(kind))
    }
}

impl fmt::Debug for PackageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageRegistry")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Handle over an open registry transaction (or a read-only lock).
///
/// Migration and pending-operation statements live in their own modules as
/// further `impl RegistryTx` blocks.
pub struct RegistryTx<'c> {
    pub(crate) conn: &'c Connection,
}

struct RawRecord {
    slug: String,
    name: String,
    version: String,
    kind: String,
    description: String,
    author: String,
    dependencies: String,
    config: String,
    enabled: bool,
    hook_entry: Option<String>,
    installed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            slug: row.get(0)?,
            name: row.get(1)?,
            version: row.get(2)?,
            kind: row.get(3)?,
            description: row.get(4)?,
            author: row.get(5)?,
            dependencies: row.get(6)?,
            config: row.get(7)?,
            enabled: row.get(8)?,
            hook_entry: row.get(9)?,
            installed_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn decode(self) -> Result<InstalledRecord> {
        let corrupt = |slug: &str, message: String| RegistryError::Corrupt {
            slug: slug.to_string(),
            message,
        };
        let kind = PackageKind::from_str(&self.kind).map_err(|e| corrupt(&self.slug, e))?;
        let dependencies: BTreeMap<String, String> = serde_json::from_str(&self.dependencies)
            .map_err(|e| corrupt(&self.slug, format!("dependencies: {}", e)))?;
        let config: serde_json::Value =
            serde_json::from_str(&self.config).map_err(|e| corrupt(&self.slug, format!("config: {}", e)))?;

        Ok(InstalledRecord {
            slug: self.slug,
            name: self.name,
            version: self.version,
            kind,
            description: self.description,
            author: self.author,
            dependencies,
            config,
            enabled: self.enabled,
            hook_entry: self.hook_entry,
            installed_at: self.installed_at,
            updated_at: self.updated_at,
        })
    }
}

impl RegistryTx<'_> {
    pub fn find(&self, slug: &str) -> Result<Option<InstalledRecord>> {
        let sql = format!("SELECT {} FROM installed_packages WHERE slug = ?1", RECORD_COLUMNS);
        let raw = self
            .conn
            .query_row(&sql, params![slug], RawRecord::from_row)
            .optional()
            .map_err(RegistryError::db("find"))?;
        raw.map(RawRecord::decode).transpose()
    }

    /// All records, optionally restricted to one kind, ordered by slug
    pub fn list(&self, kind: Option<PackageKind>) -> Result<Vec<InstalledRecord>> {
        let sql = format!(
            "SELECT {} FROM installed_packages WHERE (?1 IS NULL OR kind = ?1) ORDER BY slug",
            RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).map_err(RegistryError::db("list"))?;
        let rows = stmt
            .query_map(params![kind.map(|k| k.as_str())], RawRecord::from_row)
            .map_err(RegistryError::db("list"))?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(raw.map_err(RegistryError::db("list"))?.decode()?);
        }
        Ok(records)
    }

    /// Insert a record or overwrite every column of an existing one
    pub fn upsert(&self, record: &InstalledRecord) -> Result<()> {
        let dependencies = serde_json::to_string(&record.dependencies).map_err(|e| RegistryError::Corrupt {
            slug: record.slug.clone(),
            message: format!("dependencies: {}", e),
        })?;
        let config = serde_json::to_string(&record.config).map_err(|e| RegistryError::Corrupt {
            slug: record.slug.clone(),
            message: format!("config: {}", e),
        })?;

        self.conn
            .execute(
                "INSERT INTO installed_packages (slug, name, version, kind, description, author, dependencies, config, enabled, hook_entry, installed_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(slug) DO UPDATE SET
                    name = excluded.name,
                    version = excluded.version,
                    kind = excluded.kind,
                    description = excluded.description,
                    author = excluded.author,
                    dependencies = excluded.dependencies,
                    config = excluded.config,
                    enabled = excluded.enabled,
                    hook_entry = excluded.hook_entry,
                    installed_at = excluded.installed_at,
                    updated_at = excluded.updated_at",
                params![
                    record.slug,
                    record.name,
                    record.version,
                    record.kind.as_str(),
                    record.description,
                    record.author,
                    dependencies,
                    config,
                    record.enabled,
                    record.hook_entry,
                    record.installed_at,
                    record.updated_at,
                ],
            )
            .map_err(RegistryError::db("upsert"))?;
        Ok(())
    }

    /// Flip the enabled flag; returns false when no record exists
    pub fn set_enabled(&self, slug: &str, enabled: bool) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE installed_packages SET enabled = ?1, updated_at = ?2 WHERE slug = ?3",
                params![enabled, Utc::now(), slug],
            )
            .map_err(RegistryError::db("set_enabled"))?;
        Ok(changed > 0)
    }

    pub fn delete(&self, slug: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM installed_packages WHERE slug = ?1", params![slug])
            .map_err(RegistryError::db("delete"))?;
        Ok(removed > 0)
    }

    /// Disable every enabled theme other than `keep`; returns how many changed
    pub fn deactivate_themes_except(&self, keep: &str) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE installed_packages SET enabled = 0, updated_at = ?1
                 WHERE kind = 'theme' AND enabled = 1 AND slug <> ?2",
                params![Utc::now(), keep],
            )
            .map_err(RegistryError::db("deactivate_themes"))
    }

    /// Enabled plugins whose dependency map names `slug`
    pub fn enabled_dependents(&self, slug: &str) -> Result<Vec<String>> {
        Ok(self
            .list(Some(PackageKind::Plugin))?
            .into_iter()
            .filter(|record| record.enabled && record.slug != slug && record.depends_on(slug))
            .map(|record| record.slug)
            .collect())
    }
}
