use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::package_system::error::{ManifestError, PackageError, Result};

/// Package descriptor parsed from `plugin.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    /// Defaults to the package directory name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    /// Required plugin slug -> constraint string
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Default settings merged into the installed record
    #[serde(default = "empty_object")]
    pub config: Value,

    /// Lifecycle hook symbol; defaults to the slug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Manifest {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: None,
            version: version.to_string(),
            description: String::new(),
            author: String::new(),
            dependencies: BTreeMap::new(),
            config: empty_object(),
            entry: None,
        }
    }

    /// Check a declared slug against the directory the package lives in.
    ///
    /// `dir_slug` is already canonical. A declared slug must normalize to it.
    pub fn verify_slug(&self, dir_slug: &str) -> Result<()> {
        if let Some(declared) = &self.slug {
            let declared = declared.trim().to_ascii_lowercase();
            if declared != dir_slug {
                return Err(PackageError::Validation(format!(
                    "manifest of '{}' declares slug '{}', which does not match its directory",
                    dir_slug, declared
                )));
            }
        }
        Ok(())
    }

    /// Symbol the lifecycle hook is registered under
    pub fn hook_entry(&self, slug: &str) -> String {
        self.entry
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(slug)
            .to_string()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PackageError::Internal(format!("cannot serialize manifest: {}", e)))
    }
}

/// Reads and validates package descriptors; no side effects
pub struct ManifestLoader;

impl ManifestLoader {
    pub fn load(path: &Path) -> std::result::Result<Manifest, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::invalid(path, e.to_string()))?;
        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| ManifestError::invalid(path, e.to_string()))?;

        if manifest.name.trim().is_empty() {
            return Err(ManifestError::invalid(path, "'name' must not be empty"));
        }
        if manifest.version.trim().is_empty() {
            return Err(ManifestError::invalid(path, "'version' must not be empty"));
        }
        if manifest.config.is_null() {
            manifest.config = empty_object();
        }
        manifest.dependencies = manifest
            .dependencies
            .into_iter()
            .map(|(slug, constraint)| (slug.trim().to_ascii_lowercase(), constraint))
            .collect();

        Ok(manifest)
    }

    /// Load `<dir>/<manifest_file>`
    pub fn load_dir(dir: &Path, manifest_file: &str) -> std::result::Result<Manifest, ManifestError> {
        Self::load(&dir.join(manifest_file))
    }
}

/// Canonical form of a slug: trimmed, ASCII lowercase, `[a-z0-9][a-z0-9_-]*`
pub fn normalize_slug(raw: &str) -> Result<String> {
    let slug = raw.trim().to_ascii_lowercase();
    if is_valid_slug(&slug) {
        Ok(slug)
    } else {
        Err(PackageError::Validation(format!(
            "'{}' is not a valid slug (use lowercase letters, digits, '-' and '_')",
            raw
        )))
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Fill keys from `defaults` that `existing` lacks, recursing into objects.
///
/// Values already present in `existing` always win.
pub fn merge_config(existing: &Value, defaults: &Value) -> Value {
    match (existing, defaults) {
        (Value::Object(current), Value::Object(defaults)) => {
            let mut merged = current.clone();
            for (key, default) in defaults {
                match merged.get(key) {
                    Some(value) => {
                        let value = merge_config(value, default);
                        merged.insert(key.clone(), value);
                    }
                    None => {
                        merged.insert(key.clone(), default.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Null, defaults) => defaults.clone(),
        (existing, _) => existing.clone(),
    }
}
