use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Location;

/// Kind of extension package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Plugin,
    Theme,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Plugin => "plugin",
            PackageKind::Theme => "theme",
        }
    }

    /// Where uploads of this kind are extracted
    pub fn upload_location(&self) -> Location {
        match self {
            PackageKind::Plugin => Location::Staging,
            PackageKind::Theme => Location::Themes,
        }
    }

    /// Public namespace for published assets
    pub fn asset_location(&self) -> Location {
        match self {
            PackageKind::Plugin => Location::PublicPlugins,
            PackageKind::Theme => Location::PublicThemes,
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plugin" => Ok(PackageKind::Plugin),
            "theme" => Ok(PackageKind::Theme),
            other => Err(format!("unknown package type '{}'", other)),
        }
    }
}

/// Registry entry of an installed plugin or theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledRecord {
    /// Canonical lowercase identifier
    pub slug: String,
    pub name: String,
    /// Free-form version string
    pub version: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub description: String,
    pub author: String,
    /// Required slug -> constraint string
    pub dependencies: BTreeMap<String, String>,
    /// Opaque settings owned by the package
    pub config: serde_json::Value,
    pub enabled: bool,
    /// Lifecycle hook symbol resolved through the hook registry
    pub hook_entry: Option<String>,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstalledRecord {
    pub fn depends_on(&self, slug: &str) -> bool {
        self.dependencies.contains_key(slug)
    }

    pub fn is_theme(&self) -> bool {
        self.kind == PackageKind::Theme
    }

    /// Store holding this package's code, given its kind and enabled flag
    pub fn code_location(&self) -> Location {
        match (self.kind, self.enabled) {
            (PackageKind::Theme, _) => Location::Themes,
            (PackageKind::Plugin, true) => Location::Active,
            (PackageKind::Plugin, false) => Location::Disabled,
        }
    }
}
