use std::path::PathBuf;

use crate::kernel::error::Result;
use crate::registry::{PackageRegistry, PendingKind, PendingOperation, PendingPhase};

#[test]
fn test_pending_marker_lifecycle() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    let op = PendingOperation::new("combat-addon", PendingKind::Upgrade)
        .with_backup(Some(PathBuf::from("storage/extensions/backups/combat-addon-upgrade-1")));

    registry.transaction(|tx| tx.put_pending(&op))?;
    let stored = registry.read(|tx| tx.pending("combat-addon"))?.expect("marker should exist");
    assert_eq!(stored.operation, PendingKind::Upgrade);
    assert_eq!(stored.phase, PendingPhase::Prepared);
    assert_eq!(stored.backup_path, op.backup_path);

    assert!(registry.transaction(|tx| tx.set_pending_phase("combat-addon", PendingPhase::Moved))?);
    let stored = registry.read(|tx| tx.pending("combat-addon"))?.expect("marker should exist");
    assert_eq!(stored.phase, PendingPhase::Moved);

    assert!(registry.transaction(|tx| tx.clear_pending("combat-addon"))?);
    assert!(registry.read(|tx| tx.pending("combat-addon"))?.is_none());
    assert!(!registry.transaction(|tx| tx.clear_pending("combat-addon"))?);

    Ok(())
}

#[test]
fn test_pending_operations_lists_every_marker() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    registry.transaction(|tx| {
        tx.put_pending(&PendingOperation::new("a", PendingKind::Install))?;
        tx.put_pending(&PendingOperation::new("b", PendingKind::Disable))
    })?;

    let mut slugs: Vec<String> = registry
        .read(|tx| tx.pending_operations())?
        .into_iter()
        .map(|op| op.slug)
        .collect();
    slugs.sort();
    assert_eq!(slugs, vec!["a", "b"]);

    Ok(())
}
