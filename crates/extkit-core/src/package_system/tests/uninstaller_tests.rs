use std::sync::{Arc, Mutex};

use crate::kernel::error::Result;
use crate::package_system::cache::CacheScope;
use crate::package_system::error::{ErrorKind, HookError};
use crate::package_system::installer::Installer;
use crate::package_system::lifecycle::{HookContext, HookOutcome, Lifecycle};
use crate::package_system::theme::ThemeActivator;
use crate::package_system::toggle::Toggle;
use crate::package_system::uninstaller::Uninstaller;
use crate::registry::{PackageKind, RegistryError};
use crate::storage::Location;
use crate::tests::common::{record, TestEnv};

#[derive(Default)]
struct UninstallProbe {
    dirs: Mutex<Vec<String>>,
}

impl Lifecycle for UninstallProbe {
    fn on_install(&self, _ctx: &HookContext<'_>) -> std::result::Result<(), HookError> {
        Ok(())
    }

    fn on_uninstall(&self, ctx: &HookContext<'_>) -> std::result::Result<(), HookError> {
        self.dirs.lock().unwrap().push(ctx.package_dir.display().to_string());
        Ok(())
    }
}

fn table_exists(env: &TestEnv, table: &str) -> Result<bool> {
    let count: i64 = env.ctx().registry.read(|tx| {
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
fn test_uninstall_drops_registration_but_keeps_code() -> Result<()> {
    let env = TestEnv::new();
    let probe = Arc::new(UninstallProbe::default());
    env.hooks.register("shop", probe.clone());
    env.place(Location::Staging, "shop", "1.0.0", &[]);
    env.write(Location::Staging, "shop", "database/migrations/001_items.up.sql", "CREATE TABLE shop_items (id INTEGER);");
    env.write(Location::Staging, "shop", "database/migrations/001_items.down.sql", "DROP TABLE shop_items;");
    env.write(Location::Staging, "shop", "assets/logo.svg", "<svg/>");
    Installer::new(env.ctx()).install("shop")?;
    env.cache.take();

    let report = Uninstaller::new(env.ctx()).uninstall("shop")?;

    assert_eq!(report.hook, HookOutcome::Ok);
    assert_eq!(report.migrations.rolled_back, vec!["001_items"]);
    assert!(report.migrations.forgotten.is_empty());
    assert!(report.assets_removed);
    assert!(report.warnings.is_empty());

    assert!(env.ctx().registry.find("shop")?.is_none());
    assert!(!table_exists(&env, "shop_items")?);
    assert!(env.ctx().registry.read(|tx| tx.applied_migrations("shop"))?.is_empty());
    assert!(!env.dir.path().join("public/plugins/shop").exists());
    assert!(env.has(Location::Active, "shop"), "code directory stays on disk");
    assert_eq!(env.cache.calls(), CacheScope::ALL.to_vec());

    let dirs = probe.dirs.lock().unwrap().clone();
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].ends_with("shop"));

    Ok(())
}

#[test]
fn test_uninstall_unknown_slug_mutates_nothing() -> Result<()> {
    let env = TestEnv::new();
    env.place(Location::Active, "ghost", "1.0.0", &[]);

    let err = Uninstaller::new(env.ctx())
        .uninstall("ghost")
        .expect_err("not installed");

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("ghost"));
    assert!(env.has(Location::Active, "ghost"));
    assert!(env.cache.calls().is_empty());
    assert!(env.ctx().registry.list(None)?.is_empty());

    Ok(())
}

#[test]
fn test_uninstall_without_down_scripts_forgets_migrations() -> Result<()> {
    let env = TestEnv::new();
    env.place(Location::Staging, "bank", "1.0.0", &[]);
    env.write(Location::Staging, "bank", "database/migrations/001_accounts.sql", "CREATE TABLE bank_accounts (id INTEGER);");
    Installer::new(env.ctx()).install("bank")?;
    Toggle::new(env.ctx()).disable("bank")?;

    let report = Uninstaller::new(env.ctx()).uninstall("bank")?;

    assert_eq!(report.migrations.forgotten, vec!["001_accounts"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(table_exists(&env, "bank_accounts")?, "data of forgotten migrations stays");
    assert!(env.has(Location::Disabled, "bank"));

    Ok(())
}

#[test]
fn test_uninstall_with_missing_code_still_unregisters() -> Result<()> {
    let env = TestEnv::new();
    env.register(&record("shop", PackageKind::Plugin, true, "1.0.0"));

    let report = Uninstaller::new(env.ctx()).uninstall("shop")?;

    assert!(report.warnings.iter().any(|w| w.contains("missing")));
    assert!(env.ctx().registry.find("shop")?.is_none());

    Ok(())
}

#[test]
fn test_uninstall_theme_only_invalidates_views() -> Result<()> {
    let env = TestEnv::new();
    env.place(Location::Themes, "midnight", "1.0.0", &[]);
    env.write(Location::Themes, "midnight", "assets/site.css", "body {}");
    ThemeActivator::new(env.ctx()).install_theme("midnight")?;
    env.cache.take();

    let report = Uninstaller::new(env.ctx()).uninstall("midnight")?;

    assert_eq!(report.kind, PackageKind::Theme);
    assert!(report.assets_removed);
    assert!(!env.dir.path().join("public/themes/midnight").exists());
    assert!(env.has(Location::Themes, "midnight"));
    assert_eq!(env.cache.calls(), vec![CacheScope::Views]);

    Ok(())
}
