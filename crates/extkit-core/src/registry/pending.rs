use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::registry::database::RegistryTx;
use crate::registry::error::{RegistryError, Result};

/// Operation that moves code between stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Install,
    Upgrade,
    Disable,
    Reactivate,
}

/// How far the filesystem half of an operation got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPhase {
    /// Marker written, nothing moved yet
    Prepared,
    /// Code moved, registry not yet committed
    Moved,
}

impl PendingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingKind::Install => "install",
            PendingKind::Upgrade => "upgrade",
            PendingKind::Disable => "disable",
            PendingKind::Reactivate => "reactivate",
        }
    }
}

impl FromStr for PendingKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "install" => Ok(PendingKind::Install),
            "upgrade" => Ok(PendingKind::Upgrade),
            "disable" => Ok(PendingKind::Disable),
            "reactivate" => Ok(PendingKind::Reactivate),
            other => Err(format!("unknown pending operation '{}'", other)),
        }
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PendingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingPhase::Prepared => "prepared",
            PendingPhase::Moved => "moved",
        }
    }
}

impl FromStr for PendingPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prepared" => Ok(PendingPhase::Prepared),
            "moved" => Ok(PendingPhase::Moved),
            other => Err(format!("unknown pending phase '{}'", other)),
        }
    }
}

/// Durable marker for an in-flight filesystem move.
///
/// Written before code moves and cleared in the transaction that commits the
/// registry change. A marker that survives a crash tells startup recovery
/// which move to reverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub slug: String,
    pub operation: PendingKind,
    pub phase: PendingPhase,
    /// Provider-relative snapshot taken before the move, if any
    pub backup_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(slug: &str, operation: PendingKind) -> Self {
        Self {
            slug: slug.to_string(),
            operation,
            phase: PendingPhase::Prepared,
            backup_path: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_backup(mut self, backup: Option<PathBuf>) -> Self {
        self.backup_path = backup;
        self
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, Option<String>, DateTime<Utc>)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn decode(raw: (String, String, String, Option<String>, DateTime<Utc>)) -> Result<Self> {
        let (slug, operation, phase, backup_path, started_at) = raw;
        let operation = PendingKind::from_str(&operation).map_err(|message| RegistryError::Corrupt {
            slug: slug.clone(),
            message,
        })?;
        let phase = PendingPhase::from_str(&phase).map_err(|message| RegistryError::Corrupt {
            slug: slug.clone(),
            message,
        })?;
        Ok(Self {
            slug,
            operation,
            phase,
            backup_path: backup_path.map(PathBuf::from),
            started_at,
        })
    }
}

impl RegistryTx<'_> {
    /// Record (or replace) the marker for `op.slug`
    pub fn put_pending(&self, op: &PendingOperation) -> Result<()> {
        let backup = op.backup_path.as_ref().map(|p| p.to_string_lossy().into_owned());
        self.conn
            .execute(
                "INSERT OR REPLACE INTO pending_operations (slug, operation, phase, backup_path, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![op.slug, op.operation.as_str(), op.phase.as_str(), backup, op.started_at],
            )
            .map_err(RegistryError::db("put_pending"))?;
        Ok(())
    }

    pub fn set_pending_phase(&self, slug: &str, phase: PendingPhase) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE pending_operations SET phase = ?1 WHERE slug = ?2",
                params![phase.as_str(), slug],
            )
            .map_err(RegistryError::db("set_pending_phase"))?;
        Ok(changed > 0)
    }

    pub fn clear_pending(&self, slug: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM pending_operations WHERE slug = ?1", params![slug])
            .map_err(RegistryError::db("clear_pending"))?;
        Ok(removed > 0)
    }

    pub fn pending(&self, slug: &str) -> Result<Option<PendingOperation>> {
        let raw = self
            .conn
            .query_row(
                "SELECT slug, operation, phase, backup_path, started_at FROM pending_operations WHERE slug = ?1",
                params![slug],
                PendingOperation::from_row,
            )
            .optional()
            .map_err(RegistryError::db("pending"))?;
        raw.map(PendingOperation::decode).transpose()
    }

    /// Every surviving marker, oldest first
    pub fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        let mut stmt = self
            .conn
            .prepare("SELECT slug, operation, phase, backup_path, started_at FROM pending_operations ORDER BY started_at, slug")
            .map_err(RegistryError::db("pending_operations"))?;
        let rows = stmt
            .query_map([], PendingOperation::from_row)
            .map_err(RegistryError::db("pending_operations"))?;

        let mut ops = Vec::new();
        for raw in rows {
            ops.push(PendingOperation::decode(raw.map_err(RegistryError::db("pending_operations"))?)?);
        }
        Ok(ops)
    }
}
