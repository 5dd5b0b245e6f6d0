use std::collections::BTreeMap;

use serde::Serialize;

use crate::package_system::version::VersionRange;
use crate::registry::database::RegistryTx;
use crate::registry::error::Result;

/// A required plugin as declared in a manifest
#[derive(Debug, Clone, Serialize)]
pub struct PackageDependency {
    pub slug: String,
    /// Raw constraint string, stored as declared
    pub constraint: String,
    /// Parsed form of `constraint`, when it is a valid semver requirement
    pub range: Option<VersionRange>,
}

impl PackageDependency {
    pub fn new(slug: &str, constraint: &str) -> Self {
        Self {
            slug: slug.to_string(),
            constraint: constraint.to_string(),
            range: VersionRange::from_constraint(constraint).ok(),
        }
    }

    pub fn from_map(deps: &BTreeMap<String, String>) -> Vec<Self> {
        deps.iter().map(|(slug, constraint)| Self::new(slug, constraint)).collect()
    }

    /// Advisory message when `installed_version` violates the constraint
    pub fn advisory(&self, installed_version: &str) -> Option<String> {
        let range = self.range.as_ref()?;
        match range.includes_str(installed_version) {
            Some(false) => Some(format!(
                "'{}' {} does not satisfy constraint '{}'",
                self.slug, installed_version, range
            )),
            _ => None,
        }
    }
}

/// Outcome of a dependency check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    pub satisfied: bool,
    /// Required slugs that are not installed or not enabled, sorted
    pub missing: Vec<String>,
    /// Constraint mismatches of present dependencies; informational only
    pub advisories: Vec<String>,
}

impl DependencyCheck {
    pub fn missing_message(&self, slug: &str) -> String {
        format!(
            "'{}' requires plugins that are not installed and enabled: {}",
            slug,
            self.missing.join(", ")
        )
    }
}

/// Checks that every required plugin is installed and enabled.
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn check(tx: &RegistryTx<'_>, deps: &BTreeMap<String, String>) -> Result<DependencyCheck> {
        let mut check = DependencyCheck {
            satisfied: true,
            ..DependencyCheck::default()
        };

        for dep in PackageDependency::from_map(deps) {
            match tx.find(&dep.slug)? {
                Some(record) if record.enabled && !record.is_theme() => {
                    if let Some(advisory) = dep.advisory(&record.version) {
                        log::warn!("Dependency advisory: {}", advisory);
                        check.advisories.push(advisory);
                    }
                }
                _ => check.missing.push(dep.slug),
            }
        }

        check.missing.sort();
        check.satisfied = check.missing.is_empty();
        Ok(check)
    }
}
