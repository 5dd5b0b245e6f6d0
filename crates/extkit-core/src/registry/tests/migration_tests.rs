use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::kernel::error::Result;
use crate::registry::{discover_migrations, MigrationScript, PackageRegistry, RegistryError};

fn write_migration(package: &Path, file: &str, sql: &str) {
    let dir = package.join("database/migrations");
    fs::create_dir_all(&dir).expect("Failed to create migrations dir");
    fs::write(dir.join(file), sql).expect("Failed to write migration");
}

fn table_exists(registry: &PackageRegistry, table: &str) -> Result<bool> {
    let count: i64 = registry.read(|tx| {
        tx.conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(RegistryError::db("table_exists"))
    })?;
    Ok(count > 0)
}

#[test]
fn test_discover_pairs_up_and_down_scripts_in_order() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let package = temp_dir.path();
    write_migration(package, "002_scores.sql", "CREATE TABLE scores (id INTEGER);");
    write_migration(package, "001_wallets.up.sql", "CREATE TABLE wallets (id INTEGER);");
    write_migration(package, "001_wallets.down.sql", "DROP TABLE wallets;");
    write_migration(package, "003_orphan.down.sql", "DROP TABLE nothing;");
    write_migration(package, "notes.txt", "not sql");

    let scripts = discover_migrations(package)?;
    let names: Vec<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["001_wallets", "002_scores"]);
    assert_eq!(scripts[0].down.as_deref(), Some("DROP TABLE wallets;"));
    assert!(scripts[1].down.is_none());

    Ok(())
}

#[test]
fn test_discover_without_directory_is_empty() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    assert!(discover_migrations(temp_dir.path())?.is_empty());
    Ok(())
}

#[test]
fn test_apply_is_idempotent_and_batches_increase() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    let first = vec![MigrationScript {
        name: "001_wallets".to_string(),
        up: "CREATE TABLE wallets (id INTEGER);".to_string(),
        down: Some("DROP TABLE wallets;".to_string()),
    }];

    let ran = registry.transaction(|tx| tx.apply_migrations("core-economy", &first))?;
    assert_eq!(ran, vec!["001_wallets"]);
    assert!(table_exists(&registry, "wallets")?);

    // Re-applying the same set runs nothing
    let ran = registry.transaction(|tx| tx.apply_migrations("core-economy", &first))?;
    assert!(ran.is_empty());

    let mut second = first.clone();
    second.push(MigrationScript {
        name: "002_ledger".to_string(),
        up: "CREATE TABLE ledger (id INTEGER);".to_string(),
        down: None,
    });
    registry.transaction(|tx| tx.apply_migrations("core-economy", &second))?;

    let applied = registry.read(|tx| tx.applied_migrations("core-economy"))?;
    let batches: Vec<(String, i64)> = applied.into_iter().map(|m| (m.migration, m.batch)).collect();
    assert_eq!(
        batches,
        vec![("001_wallets".to_string(), 1), ("002_ledger".to_string(), 2)]
    );

    Ok(())
}

#[test]
fn test_failing_migration_rolls_back_whole_batch() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    let scripts = vec![
        MigrationScript {
            name: "001_ok".to_string(),
            up: "CREATE TABLE fine (id INTEGER);".to_string(),
            down: None,
        },
        MigrationScript {
            name: "002_broken".to_string(),
            up: "CREATE TABLE ;".to_string(),
            down: None,
        },
    ];

    let outcome = registry.transaction(|tx| tx.apply_migrations("broken", &scripts));
    match outcome {
        Err(RegistryError::Migration { migration, .. }) => assert_eq!(migration, "002_broken"),
        other => panic!("Expected migration error, got {:?}", other.map(|_| ())),
    }
    assert!(!table_exists(&registry, "fine")?, "First migration must be rolled back");
    assert!(registry.read(|tx| tx.applied_migrations("broken"))?.is_empty());

    Ok(())
}

#[test]
fn test_rollback_runs_down_scripts_and_forgets_the_rest() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    let scripts = vec![
        MigrationScript {
            name: "001_wallets".to_string(),
            up: "CREATE TABLE wallets (id INTEGER);".to_string(),
            down: Some("DROP TABLE wallets;".to_string()),
        },
        MigrationScript {
            name: "002_ledger".to_string(),
            up: "CREATE TABLE ledger (id INTEGER);".to_string(),
            down: None,
        },
    ];
    registry.transaction(|tx| tx.apply_migrations("core-economy", &scripts))?;

    let summary = registry.transaction(|tx| tx.rollback_migrations("core-economy", &scripts))?;
    assert_eq!(summary.rolled_back, vec!["001_wallets"]);
    assert_eq!(summary.forgotten, vec!["002_ledger"]);
    assert!(!table_exists(&registry, "wallets")?);
    assert!(table_exists(&registry, "ledger")?, "Tables without a down script stay");
    assert!(registry.read(|tx| tx.applied_migrations("core-economy"))?.is_empty());

    Ok(())
}
