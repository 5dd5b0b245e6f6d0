use crate::kernel::error::Result;
use crate::package_system::cache::CacheScope;
use crate::package_system::error::ErrorKind;
use crate::package_system::theme::ThemeActivator;
use crate::registry::PackageKind;
use crate::storage::Location;
use crate::tests::common::{record, TestEnv};

fn enabled_themes(env: &TestEnv) -> Result<Vec<String>> {
    Ok(env
        .ctx()
        .registry
        .list(Some(PackageKind::Theme))?
        .into_iter()
        .filter(|r| r.enabled)
        .map(|r| r.slug)
        .collect())
}

#[test]
fn test_install_theme_registers_disabled_and_publishes_assets() -> Result<()> {
    let env = TestEnv::new();
    env.place(Location::Themes, "midnight", "1.0.0", &[]);
    env.write(Location::Themes, "midnight", "assets/css/site.css", "body { color: #000 }");

    let report = ThemeActivator::new(env.ctx()).install_theme("midnight")?;

    assert!(report.is_new);
    assert!(!report.active);
    assert_eq!(report.assets_published, Some(1));
    assert!(env.dir.path().join("public/themes/midnight/css/site.css").is_file());
    let theme = env.ctx().registry.find("midnight")?.expect("registered");
    assert_eq!(theme.kind, PackageKind::Theme);
    assert!(!theme.enabled);
    assert_eq!(env.cache.calls(), vec![CacheScope::Views]);

    Ok(())
}

#[test]
fn test_reinstall_theme_refreshes_metadata_and_keeps_activation() -> Result<()> {
    let env = TestEnv::new();
    let themes = ThemeActivator::new(env.ctx());
    env.place(Location::Themes, "midnight", "1.0.0", &[]);
    themes.install_theme("midnight")?;
    themes.activate_theme("midnight")?;

    env.place(Location::Themes, "midnight", "1.1.0", &[]);
    let report = themes.install_theme("midnight")?;

    assert!(!report.is_new);
    assert!(report.active);
    assert_eq!(env.ctx().registry.find("midnight")?.expect("kept").version, "1.1.0");

    Ok(())
}

#[test]
fn test_install_theme_errors() {
    let env = TestEnv::new();
    let themes = ThemeActivator::new(env.ctx());
    assert_eq!(themes.install_theme("ghost").expect_err("missing").kind(), ErrorKind::NotFound);

    env.register(&record("shop", PackageKind::Plugin, true, "1.0.0"));
    env.place(Location::Themes, "shop", "1.0.0", &[]);
    assert_eq!(themes.install_theme("shop").expect_err("plugin slug").kind(), ErrorKind::Conflict);
}

#[test]
fn test_activate_leaves_exactly_one_enabled_theme() -> Result<()> {
    let env = TestEnv::new();
    for slug in ["aurora", "midnight", "sunrise"] {
        env.register(&record(slug, PackageKind::Theme, false, "1.0.0"));
    }
    let themes = ThemeActivator::new(env.ctx());

    // From zero enabled
    let report = themes.activate_theme("midnight")?;
    assert_eq!(report.deactivated, 0);
    assert!(!report.already_active);
    assert_eq!(enabled_themes(&env)?, vec!["midnight"]);

    // From one enabled
    let report = themes.activate_theme("sunrise")?;
    assert_eq!(report.deactivated, 1);
    assert_eq!(enabled_themes(&env)?, vec!["sunrise"]);

    // Re-activating is harmless
    let report = themes.activate_theme("sunrise")?;
    assert!(report.already_active);
    assert_eq!(report.deactivated, 0);
    assert_eq!(enabled_themes(&env)?, vec!["sunrise"]);

    assert!(env.cache.calls().iter().all(|scope| *scope == CacheScope::Views));

    Ok(())
}

#[test]
fn test_activate_requires_installed_theme() {
    let env = TestEnv::new();
    let themes = ThemeActivator::new(env.ctx());
    assert_eq!(themes.activate_theme("ghost").expect_err("missing").kind(), ErrorKind::NotFound);

    env.register(&record("shop", PackageKind::Plugin, true, "1.0.0"));
    assert_eq!(themes.activate_theme("shop").expect_err("plugin").kind(), ErrorKind::Validation);
}
