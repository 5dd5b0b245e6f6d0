use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use crate::kernel::error::Result;
use crate::storage::config::{ConfigFormat, ManagerConfig};
use crate::storage::error::StorageSystemError;

#[test]
fn test_config_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("extkit.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("EXTKIT.JSON")), Some(ConfigFormat::Json));
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("extkit.yml")), Some(ConfigFormat::Yaml));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("extkit.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_path(Path::new("extkit.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("extkit")), None);
}

#[test]
fn test_defaults_resolve_against_base_dir() {
    let config = ManagerConfig::for_base_dir("/srv/site");
    assert_eq!(config.plugins_dir, PathBuf::from("plugins"));
    assert_eq!(config.manifest_file, "plugin.json");
    assert_eq!(
        config.database_path(),
        PathBuf::from("/srv/site/storage/extensions/registry.sqlite3")
    );
    assert_eq!(config.resolve(Path::new("/abs/db.sqlite3")), PathBuf::from("/abs/db.sqlite3"));
}

#[test]
fn test_load_json_defaults_base_dir_to_config_location() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("extkit.json");
    fs::write(&path, r#"{ "themes_dir": "site/themes" }"#).expect("write config");

    let config = ManagerConfig::load(&path)?;
    assert_eq!(config.base_dir, dir.path());
    assert_eq!(config.themes_dir, PathBuf::from("site/themes"));
    assert_eq!(config.staging_dir, PathBuf::from("storage/extensions/staging"));

    Ok(())
}

#[test]
fn test_load_keeps_explicit_base_dir() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("extkit.json");
    fs::write(&path, r#"{ "base_dir": "/var/lib/site" }"#).expect("write config");

    let config = ManagerConfig::load(&path)?;
    assert_eq!(config.base_dir, PathBuf::from("/var/lib/site"));
    Ok(())
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_load_yaml() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("extkit.yaml");
    fs::write(&path, "plugins_dir: addons\nmanifest_file: addon.json\n").expect("write config");

    let config = ManagerConfig::load(&path)?;
    assert_eq!(config.plugins_dir, PathBuf::from("addons"));
    assert_eq!(config.manifest_file, "addon.json");
    Ok(())
}

#[cfg(feature = "toml-config")]
#[test]
fn test_save_and_load_toml() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("extkit.toml");
    let mut config = ManagerConfig::for_base_dir(dir.path());
    config.public_dir = PathBuf::from("www");

    config.save(&path)?;
    assert_eq!(ManagerConfig::load(&path)?, config);
    Ok(())
}

#[test]
fn test_load_rejects_bad_input() {
    let dir = tempdir().expect("Failed to create temp directory");

    let ini = dir.path().join("extkit.ini");
    fs::write(&ini, "").expect("write config");
    assert!(matches!(
        ManagerConfig::load(&ini),
        Err(StorageSystemError::UnsupportedConfigFormat(_))
    ));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").expect("write config");
    assert!(matches!(
        ManagerConfig::load(&broken),
        Err(StorageSystemError::DeserializationError { .. })
    ));

    let nested = dir.path().join("nested.json");
    fs::write(&nested, r#"{ "manifest_file": "meta/plugin.json" }"#).expect("write config");
    assert!(matches!(ManagerConfig::load(&nested), Err(StorageSystemError::InvalidPath { .. })));
}
