/// Application name
pub const APP_NAME: &str = "extkit";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package descriptor file name expected at the root of every package
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Code for enabled plugins
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Uploaded plugins waiting for installation
pub const DEFAULT_STAGING_DIR: &str = "storage/extensions/staging";

/// Code for installed but disabled plugins
pub const DEFAULT_DISABLED_DIR: &str = "storage/extensions/disabled";

/// Pre-upgrade snapshots
pub const DEFAULT_BACKUPS_DIR: &str = "storage/extensions/backups";

/// Installed themes
pub const DEFAULT_THEMES_DIR: &str = "themes";

/// Servable asset root
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Registry database file
pub const DEFAULT_DATABASE_FILE: &str = "storage/extensions/registry.sqlite3";

/// Package subdirectory holding schema scripts
pub const MIGRATIONS_DIR: &str = "database/migrations";

/// Package subdirectory holding static files to publish
pub const ASSETS_DIR: &str = "assets";

/// Version written by the scaffolder
pub const SCAFFOLD_VERSION: &str = "0.1.0";
