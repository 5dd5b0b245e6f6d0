use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;

use crate::kernel::error::{Error, Result};
use crate::registry::{InstalledRecord, PackageKind, PackageRegistry, RegistryError};

fn record(slug: &str, kind: PackageKind, enabled: bool) -> InstalledRecord {
    let now = Utc::now();
    InstalledRecord {
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        version: "1.0.0".to_string(),
        kind,
        description: String::new(),
        author: "tester".to_string(),
        dependencies: BTreeMap::new(),
        config: json!({}),
        enabled,
        hook_entry: None,
        installed_at: now,
        updated_at: now,
    }
}

#[test]
fn test_upsert_and_find_round_trip_preserves_json_columns() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;

    let mut rec = record("combat-addon", PackageKind::Plugin, true);
    rec.dependencies.insert("core-economy".to_string(), "^1.0".to_string());
    rec.config = json!({ "max_players": 8, "pvp": true });
    rec.hook_entry = Some("combat-addon".to_string());

    registry.transaction(|tx| tx.upsert(&rec))?;

    let found = registry.find("combat-addon")?.expect("record should exist");
    assert_eq!(found.dependencies.get("core-economy").map(String::as_str), Some("^1.0"));
    assert_eq!(found.config["max_players"], 8);
    assert!(found.enabled);
    assert_eq!(found.hook_entry.as_deref(), Some("combat-addon"));
    assert!(registry.find("missing")?.is_none());

    Ok(())
}

#[test]
fn test_upsert_overwrites_existing_row() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    registry.transaction(|tx| tx.upsert(&record("shop", PackageKind::Plugin, true)))?;

    let mut updated = record("shop", PackageKind::Plugin, false);
    updated.version = "2.0.0".to_string();
    registry.transaction(|tx| tx.upsert(&updated))?;

    let all = registry.list(None)?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].version, "2.0.0");
    assert!(!all[0].enabled);

    Ok(())
}

#[test]
fn test_failed_transaction_rolls_back() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;

    let outcome: Result<()> = registry.transaction(|tx| {
        tx.upsert(&record("ghost", PackageKind::Plugin, true))?;
        Err(Error::Other("abort".to_string()))
    });
    assert!(outcome.is_err());
    assert!(registry.find("ghost")?.is_none(), "Rolled back insert must not be visible");

    Ok(())
}

#[test]
fn test_list_filters_by_kind_sorted_by_slug() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    registry.transaction(|tx| {
        tx.upsert(&record("zeta", PackageKind::Plugin, true))?;
        tx.upsert(&record("alpha", PackageKind::Plugin, false))?;
        tx.upsert(&record("dark", PackageKind::Theme, false))
    })?;

    let plugins: Vec<String> = registry
        .list(Some(PackageKind::Plugin))?
        .into_iter()
        .map(|r| r.slug)
        .collect();
    assert_eq!(plugins, vec!["alpha", "zeta"]);
    assert_eq!(registry.list(Some(PackageKind::Theme))?.len(), 1);
    assert_eq!(registry.list(None)?.len(), 3);

    Ok(())
}

#[test]
fn test_only_one_theme_can_be_enabled() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    registry.transaction(|tx| {
        tx.upsert(&record("light", PackageKind::Theme, true))?;
        tx.upsert(&record("dark", PackageKind::Theme, false))
    })?;

    // Enabling a second theme directly violates the partial unique index
    let direct: std::result::Result<bool, RegistryError> = registry.transaction(|tx| tx.set_enabled("dark", true));
    assert!(matches!(direct, Err(RegistryError::Database { .. })));

    // Deactivating the others first is the supported path
    registry.transaction(|tx| {
        let changed = tx.deactivate_themes_except("dark")?;
        assert_eq!(changed, 1);
        tx.set_enabled("dark", true)
    })?;

    let enabled: Vec<String> = registry
        .list(Some(PackageKind::Theme))?
        .into_iter()
        .filter(|r| r.enabled)
        .map(|r| r.slug)
        .collect();
    assert_eq!(enabled, vec!["dark"]);

    Ok(())
}

#[test]
fn test_enabled_dependents_ignores_disabled_plugins() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    let mut active = record("combat-addon", PackageKind::Plugin, true);
    active.dependencies.insert("core-economy".to_string(), "*".to_string());
    let mut idle = record("trade-addon", PackageKind::Plugin, false);
    idle.dependencies.insert("core-economy".to_string(), "*".to_string());

    registry.transaction(|tx| {
        tx.upsert(&record("core-economy", PackageKind::Plugin, true))?;
        tx.upsert(&active)?;
        tx.upsert(&idle)
    })?;

    let dependents = registry.read(|tx| tx.enabled_dependents("core-economy"))?;
    assert_eq!(dependents, vec!["combat-addon"]);

    Ok(())
}

#[test]
fn test_delete_and_set_enabled_report_missing_rows() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    assert!(!registry.transaction(|tx| tx.set_enabled("nobody", true))?);
    assert!(!registry.transaction(|tx| tx.delete("nobody"))?);

    registry.transaction(|tx| tx.upsert(&record("someone", PackageKind::Plugin, true)))?;
    assert!(registry.transaction(|tx| tx.delete("someone"))?);
    assert!(registry.find("someone")?.is_none());

    Ok(())
}

#[test]
fn test_open_creates_parent_directories_and_persists() -> Result<()> {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("storage/extensions/registry.sqlite3");

    {
        let registry = PackageRegistry::open(&path)?;
        registry.transaction(|tx| tx.upsert(&record("kept", PackageKind::Plugin, true)))?;
    }

    let reopened = PackageRegistry::open(&path)?;
    assert_eq!(reopened.location(), Some(path.as_path()));
    assert!(reopened.find("kept")?.is_some());

    Ok(())
}
