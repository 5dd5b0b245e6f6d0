use std::collections::BTreeMap;

use crate::kernel::error::Result;
use crate::package_system::dependency::{DependencyResolver, PackageDependency};
use crate::package_system::version::VersionRange;
use crate::registry::{PackageKind, PackageRegistry};
use crate::tests::common::record;

fn deps(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(s, c)| (s.to_string(), c.to_string())).collect()
}

#[test]
fn test_check_requires_installed_and_enabled_plugins() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    registry.transaction(|tx| -> std::result::Result<(), crate::registry::RegistryError> {
        tx.upsert(&record("core-economy", PackageKind::Plugin, true, "1.2.0"))?;
        tx.upsert(&record("maps", PackageKind::Plugin, false, "1.0.0"))?;
        tx.upsert(&record("dark", PackageKind::Theme, true, "1.0.0"))?;
        Ok(())
    })?;

    let required = deps(&[("core-economy", "*"), ("maps", "*"), ("dark", "*"), ("ghost", "^1")]);
    let check = registry.read(|tx| DependencyResolver::check(tx, &required))?;

    assert!(!check.satisfied);
    assert_eq!(check.missing, vec!["dark", "ghost", "maps"]);
    assert!(check.advisories.is_empty());
    let message = check.missing_message("combat-addon");
    assert!(message.contains("combat-addon") && message.contains("ghost"));

    let check = registry.read(|tx| DependencyResolver::check(tx, &BTreeMap::new()))?;
    assert!(check.satisfied);

    Ok(())
}

#[test]
fn test_constraint_mismatch_is_only_advisory() -> Result<()> {
    let registry = PackageRegistry::open_in_memory()?;
    registry.transaction(|tx| tx.upsert(&record("core-economy", PackageKind::Plugin, true, "1.2.0")))?;

    let required = deps(&[("core-economy", "^2.0")]);
    let check = registry.read(|tx| DependencyResolver::check(tx, &required))?;

    assert!(check.satisfied);
    assert_eq!(check.advisories.len(), 1);
    assert!(check.advisories[0].contains("^2.0"));

    Ok(())
}

#[test]
fn test_unparseable_constraints_and_versions_are_ignored() {
    let dep = PackageDependency::new("core-economy", "latest please");
    assert!(dep.range.is_none());
    assert!(dep.advisory("1.0.0").is_none());

    let dep = PackageDependency::new("core-economy", ">=1.0");
    assert!(dep.advisory("build-42").is_none());
    assert!(dep.advisory("0.9.0").is_some());

    let range: VersionRange = "~1.2".parse().expect("valid constraint");
    assert_eq!(range.includes_str("1.2.9"), Some(true));
    assert_eq!(range.includes_str("1.3.0"), Some(false));
    assert_eq!(range.to_string(), "~1.2");
    assert!("not a range".parse::<VersionRange>().is_err());
}
