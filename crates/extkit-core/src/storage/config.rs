use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::storage::error::{Result, StorageSystemError};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Deserialize any serde type from a string in this format
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self, data: &str) -> Result<T> {
        let format = self.extension().to_string();
        match self {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| StorageSystemError::DeserializationError { format, source: Box::new(e) }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| StorageSystemError::DeserializationError { format, source: Box::new(e) }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| StorageSystemError::DeserializationError { format, source: Box::new(e) }),
        }
    }

    /// Serialize any serde type to a string in this format
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        let format = self.extension().to_string();
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|e| StorageSystemError::SerializationError { format, source: Box::new(e) }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value)
                .map_err(|e| StorageSystemError::SerializationError { format, source: Box::new(e) }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value)
                .map_err(|e| StorageSystemError::SerializationError { format, source: Box::new(e) }),
        }
    }
}

/// Where the lifecycle manager keeps code, staging areas and its registry.
///
/// Relative paths are resolved against `base_dir`; absolute paths are used
/// as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub base_dir: PathBuf,
    /// Code for enabled plugins
    pub plugins_dir: PathBuf,
    /// Uploaded but not yet installed plugins
    pub staging_dir: PathBuf,
    /// Code for installed but disabled plugins
    pub disabled_dir: PathBuf,
    /// Snapshots taken before an upgrade or a stale-directory replacement
    pub backups_dir: PathBuf,
    pub themes_dir: PathBuf,
    /// Servable root; assets land in `<public_dir>/plugins/<slug>` and `<public_dir>/themes/<slug>`
    pub public_dir: PathBuf,
    /// SQLite registry database
    pub database: PathBuf,
    pub manifest_file: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            plugins_dir: PathBuf::from(constants::DEFAULT_PLUGINS_DIR),
            staging_dir: PathBuf::from(constants::DEFAULT_STAGING_DIR),
            disabled_dir: PathBuf::from(constants::DEFAULT_DISABLED_DIR),
            backups_dir: PathBuf::from(constants::DEFAULT_BACKUPS_DIR),
            themes_dir: PathBuf::from(constants::DEFAULT_THEMES_DIR),
            public_dir: PathBuf::from(constants::DEFAULT_PUBLIC_DIR),
            database: PathBuf::from(constants::DEFAULT_DATABASE_FILE),
            manifest_file: constants::MANIFEST_FILE_NAME.to_string(),
        }
    }
}

impl ManagerConfig {
    /// Default layout rooted at `base_dir`
    pub fn for_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Load a configuration file, picking the format from its extension.
    ///
    /// When the file does not set `base_dir`, the directory containing the
    /// file is used.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = std::fs::read_to_string(path).map_err(|e| StorageSystemError::io(e, "read_config", path))?;

        let raw: serde_json::Value = format.deserialize(&content)?;
        let sets_base_dir = raw.get("base_dir").is_some();
        let mut config: ManagerConfig = serde_json::from_value(raw).map_err(|e| {
            StorageSystemError::DeserializationError {
                format: format.extension().to_string(),
                source: Box::new(e),
            }
        })?;

        if !sets_base_dir {
            if let Some(parent) = path.parent() {
                config.base_dir = parent.to_path_buf();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration in the format implied by `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = format.serialize(self)?;
        std::fs::write(path, content).map_err(|e| StorageSystemError::io(e, "write_config", path))
    }

    /// Resolve a configured path against `base_dir`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database)
    }

    fn validate(&self) -> Result<()> {
        let name = self.manifest_file.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(StorageSystemError::InvalidPath {
                path: PathBuf::from(&self.manifest_file),
                reason: "manifest_file must be a plain file name".to_string(),
            });
        }
        Ok(())
    }
}
