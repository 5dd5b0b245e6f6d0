//! Drift detection and recovery of interrupted operations.
//!
//! The registry is authoritative. The filesystem is treated as a derived
//! cache that can be checked against it ([`Reconciler::verify`]) and partly
//! repaired ([`Reconciler::reconcile`]). Repairs never delete code: records
//! without code and code without records are only reported.
use std::collections::HashMap;

use serde::Serialize;

use crate::package_system::context::PackageContext;
use crate::package_system::error::Result;
use crate::registry::{InstalledRecord, PendingKind, PendingOperation};
use crate::storage::Location;

/// One mismatch between registry and filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    pub slug: String,
    pub location: Location,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriftReport {
    /// Records whose code directory exists nowhere
    pub missing_code: Vec<DriftEntry>,
    /// Code directories without a matching record
    pub unregistered: Vec<DriftEntry>,
    /// Plugin code sitting in the store that does not match `enabled`
    pub misplaced: Vec<DriftEntry>,
    /// Markers of operations that never committed
    pub pending: Vec<PendingOperation>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.missing_code.is_empty() && self.unregistered.is_empty() && self.misplaced.is_empty() && self.pending.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.missing_code.len() + self.unregistered.len() + self.misplaced.len() + self.pending.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryFailure {
    pub slug: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Slugs whose interrupted operation was rolled back
    pub recovered: Vec<String>,
    pub failed: Vec<RecoveryFailure>,
    /// Plugins moved into the store matching their `enabled` flag
    pub relocated: Vec<String>,
    /// Drift left after repairs
    pub remaining: DriftReport,
}

pub struct Reconciler<'a> {
    ctx: &'a PackageContext,
}

impl<'a> Reconciler<'a> {
    pub fn new(ctx: &'a PackageContext) -> Self {
        Self { ctx }
    }

    pub fn verify(&self) -> Result<DriftReport> {
        let store = &self.ctx.store;
        let records = self.ctx.registry.list(None)?;
        let by_slug: HashMap<&str, &InstalledRecord> = records.iter().map(|r| (r.slug.as_str(), r)).collect();
        let mut report = DriftReport::default();

        for record in &records {
            let expected = record.code_location();
            if store.contains(expected, &record.slug) {
                continue;
            }
            match other_plugin_store(record) {
                Some(found) if store.contains(found, &record.slug) => report.misplaced.push(DriftEntry {
                    slug: record.slug.clone(),
                    location: found,
                    detail: format!("expected in {} (enabled={})", expected, record.enabled),
                }),
                _ => report.missing_code.push(DriftEntry {
                    slug: record.slug.clone(),
                    location: expected,
                    detail: format!("registered {} has no code directory", record.kind),
                }),
            }
        }

        for location in [Location::Active, Location::Disabled, Location::Themes] {
            for slug in store.list(location)? {
                let detail = match by_slug.get(slug.as_str()) {
                    None => "no registry record".to_string(),
                    Some(record) if record.code_location() == location => continue,
                    Some(record) if store.contains(record.code_location(), &record.slug) => {
                        format!("stray copy; registered code lives in {}", record.code_location())
                    }
                    // Reported as misplaced above
                    Some(record) if other_plugin_store(record) == Some(location) => continue,
                    Some(record) => format!("directory of a registered {} in the wrong store", record.kind),
                };
                report.unregistered.push(DriftEntry { slug, location, detail });
            }
        }

        report.pending = self.ctx.registry.read(|tx| tx.pending_operations())?;
        Ok(report)
    }

    /// Recover every pending marker, relocate misplaced plugins, report the rest
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = self.recover_pending()?;

        for entry in self.verify()?.misplaced {
            match self.relocate(&entry.slug) {
                Ok(true) => report.relocated.push(entry.slug),
                Ok(false) => {}
                Err(e) => report.failed.push(RecoveryFailure {
                    slug: entry.slug,
                    error: e.to_string(),
                }),
            }
        }

        report.remaining = self.verify()?;
        Ok(report)
    }

    /// Roll back every interrupted operation; leaves other drift alone
    pub fn recover_pending(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for op in self.ctx.registry.read(|tx| tx.pending_operations())? {
            match self.recover(&op) {
                Ok(()) => report.recovered.push(op.slug),
                Err(e) => {
                    log::error!("Recovery of '{}' failed: {}", op.slug, e);
                    report.failed.push(RecoveryFailure {
                        slug: op.slug,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Return the filesystem to its state before `op` started and drop the marker.
    ///
    /// A surviving marker means the registry change never committed, so the
    /// registry still describes the pre-operation state.
    pub fn recover(&self, op: &PendingOperation) -> Result<()> {
        let store = &self.ctx.store;
        let slug = op.slug.as_str();
        let record = self.ctx.registry.find(slug)?;

        match op.operation {
            PendingKind::Install | PendingKind::Upgrade => {
                let target = record.as_ref().map(|r| r.code_location()).unwrap_or(Location::Active);
                if !store.contains(Location::Staging, slug) && store.contains(target, slug) {
                    store.move_package(slug, target, Location::Staging)?;
                }
                if let Some(backup) = &op.backup_path {
                    if store.provider().exists(backup) {
                        store.restore_snapshot(backup, target, slug)?;
                    } else {
                        log::warn!("Backup {} of '{}' is gone; previous code not restored", backup.display(), slug);
                    }
                }
            }
            PendingKind::Disable | PendingKind::Reactivate => {
                if let Some(record) = &record {
                    let original = record.code_location();
                    if let Some(other) = other_plugin_store(record) {
                        if !store.contains(original, slug) && store.contains(other, slug) {
                            store.move_package(slug, other, original)?;
                        }
                        // Stale copy that was moved out of the destination
                        if let Some(backup) = &op.backup_path {
                            if !store.contains(other, slug) && store.provider().exists(backup) {
                                store.restore_snapshot(backup, other, slug)?;
                            }
                        }
                    }
                }
            }
        }

        self.ctx.registry.transaction(|tx| tx.clear_pending(slug))?;
        log::info!("Rolled back interrupted {} of '{}'", op.operation, slug);
        Ok(())
    }

    /// Recover the marker of `slug` if one is still there; false when none was
    pub fn recover_slug(&self, slug: &str) -> Result<bool> {
        match self.ctx.registry.read(|tx| tx.pending(slug))? {
            Some(marker) => {
                self.recover(&marker)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Immediately roll back the failed operation on `slug`.
    ///
    /// When this fails too the marker stays behind for startup recovery.
    pub fn compensate(&self, slug: &str) {
        let marker = match self.ctx.registry.read(|tx| tx.pending(slug)) {
            Ok(Some(marker)) => marker,
            Ok(None) => return,
            Err(e) => {
                log::error!("Cannot read pending marker of '{}': {}", slug, e);
                return;
            }
        };
        if let Err(e) = self.recover(&marker) {
            log::error!(
                "Could not undo interrupted {} of '{}': {}; startup recovery will retry",
                marker.operation,
                slug,
                e
            );
        }
    }

    /// Move a plugin's code into the store its `enabled` flag calls for
    pub fn relocate(&self, slug: &str) -> Result<bool> {
        let Some(record) = self.ctx.registry.find(slug)? else {
            return Ok(false);
        };
        let expected = record.code_location();
        match other_plugin_store(&record) {
            Some(found) if !self.ctx.store.contains(expected, slug) && self.ctx.store.contains(found, slug) => {
                self.ctx.store.move_package(slug, found, expected)?;
                log::info!("Moved '{}' from {} to {}", slug, found, expected);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// The plugin store a record's code is *not* expected in
fn other_plugin_store(record: &InstalledRecord) -> Option<Location> {
    match record.code_location() {
        Location::Active => Some(Location::Disabled),
        Location::Disabled => Some(Location::Active),
        _ => None,
    }
}
