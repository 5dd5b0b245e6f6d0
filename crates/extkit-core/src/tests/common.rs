//! Fixtures shared by the package system, kernel and storage tests.
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::package_system::{
    DefaultPackageManager, HookRegistry, PackageContext, RecordingCacheInvalidator,
};
use crate::registry::{InstalledRecord, PackageKind};
use crate::storage::error::Result as StorageResult;
use crate::storage::{LocalStorageProvider, Location, ManagerConfig, PackageStore, StorageProvider, StorageSystemError};

/// Build a zip archive from `(path, contents)` pairs; paths ending in `/` become directories
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (path, contents) in entries {
        if path.ends_with('/') {
            writer.add_directory(*path, options).unwrap();
        } else {
            writer.start_file(*path, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn manifest_json(name: &str, version: &str, dependencies: &[(&str, &str)]) -> String {
    let deps: serde_json::Map<String, Value> = dependencies
        .iter()
        .map(|(slug, constraint)| (slug.to_string(), json!(constraint)))
        .collect();
    json!({
        "name": name,
        "version": version,
        "description": format!("{} package", name),
        "author": "Extkit Tests",
        "dependencies": deps,
        "config": { "enabled_features": ["base"], "limit": 10 },
    })
    .to_string()
}

/// A package archive rooted at `slug/` with a manifest plus extra files
pub fn package_zip(slug: &str, version: &str, dependencies: &[(&str, &str)], extra: &[(&str, &str)]) -> Vec<u8> {
    let manifest = manifest_json(slug, version, dependencies);
    let manifest_path = format!("{}/plugin.json", slug);
    let extra_paths: Vec<(String, &str)> = extra
        .iter()
        .map(|(path, contents)| (format!("{}/{}", slug, path), *contents))
        .collect();

    let mut entries: Vec<(&str, &str)> = vec![(manifest_path.as_str(), manifest.as_str())];
    entries.extend(extra_paths.iter().map(|(path, contents)| (path.as_str(), *contents)));
    zip_bytes(&entries)
}

/// Registry row without any code behind it
pub fn record(slug: &str, kind: PackageKind, enabled: bool, version: &str) -> InstalledRecord {
    let now = Utc::now();
    InstalledRecord {
        slug: slug.to_string(),
        name: slug.to_string(),
        version: version.to_string(),
        kind,
        description: String::new(),
        author: "Extkit Tests".to_string(),
        dependencies: BTreeMap::new(),
        config: json!({}),
        enabled,
        hook_entry: Some(slug.to_string()),
        installed_at: now,
        updated_at: now,
    }
}

/// Local provider that can fail or pause one chosen rename
#[derive(Debug)]
pub struct InterceptingProvider {
    inner: LocalStorageProvider,
    fail_from: Option<PathBuf>,
    hold_into: Option<PathBuf>,
    reached: Arc<Notify>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl InterceptingProvider {
    /// Every rename whose source is `from` fails with an I/O error
    pub fn failing_rename_from(base: PathBuf, from: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalStorageProvider::new(base),
            fail_from: Some(from.into()),
            hold_into: None,
            reached: Arc::new(Notify::new()),
            release: Mutex::new(None),
        }
    }

    /// The first rename into `prefix` completes, signals `reached`, then
    /// blocks until `release` yields or its sender is dropped
    pub fn holding_rename_into(
        base: PathBuf,
        prefix: impl Into<PathBuf>,
        reached: Arc<Notify>,
        release: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            inner: LocalStorageProvider::new(base),
            fail_from: None,
            hold_into: Some(prefix.into()),
            reached,
            release: Mutex::new(Some(release)),
        }
    }
}

impl StorageProvider for InterceptingProvider {
    fn name(&self) -> &str {
        "InterceptingProvider"
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.inner.resolve(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner.create_dir_all(path)
    }

    fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        self.inner.read_to_string(path)
    }

    fn write_string(&self, path: &Path, contents: &str) -> StorageResult<()> {
        self.inner.write_string(path, contents)
    }

    fn write_bytes(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        self.inner.write_bytes(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        if self.fail_from.as_deref() == Some(from) {
            let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "rename refused by test provider");
            return Err(StorageSystemError::io(err, "rename", from));
        }
        self.inner.rename(from, to)?;
        if self.hold_into.as_deref().is_some_and(|prefix| to.starts_with(prefix)) {
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                self.reached.notify_one();
                let _ = release.recv();
            }
        }
        Ok(())
    }

    fn copy_dir_all(&self, from: &Path, to: &Path) -> StorageResult<u64> {
        self.inner.copy_dir_all(from, to)
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner.remove_dir_all(path)
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }
}

/// A temporary base directory with a ready package manager
pub struct TestEnv {
    pub dir: TempDir,
    pub config: ManagerConfig,
    pub manager: DefaultPackageManager,
    pub hooks: Arc<HookRegistry>,
    pub cache: Arc<RecordingCacheInvalidator>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_provider(|base| Arc::new(LocalStorageProvider::new(base)))
    }

    /// Same environment with the store backed by the provider `make` builds over the base directory
    pub fn with_provider(make: impl FnOnce(PathBuf) -> Arc<dyn StorageProvider>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ManagerConfig::for_base_dir(dir.path());
        let store = PackageStore::new(make(dir.path().to_path_buf()), &config);
        store.ensure_layout().unwrap();

        let hooks = Arc::new(HookRegistry::new());
        let cache = Arc::new(RecordingCacheInvalidator::new());
        let manager = DefaultPackageManager::open(&config, store, hooks.clone(), cache.clone()).unwrap();
        Self {
            dir,
            config,
            manager,
            hooks,
            cache,
        }
    }

    pub fn ctx(&self) -> &PackageContext {
        self.manager.context()
    }

    pub fn store(&self) -> &PackageStore {
        &self.ctx().store
    }

    pub fn has(&self, location: Location, slug: &str) -> bool {
        self.store().contains(location, slug)
    }

    /// Write a package directory straight into a location, bypassing upload
    pub fn place(&self, location: Location, slug: &str, version: &str, dependencies: &[(&str, &str)]) {
        let dir = self.store().absolute_package_path(location, slug);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("plugin.json"), manifest_json(slug, version, dependencies)).unwrap();
    }

    /// Insert `record` directly into the registry
    pub fn register(&self, record: &InstalledRecord) {
        self.ctx().registry.transaction(|tx| tx.upsert(record)).unwrap();
    }

    /// Write a file inside a package directory
    pub fn write(&self, location: Location, slug: &str, relative: &str, contents: &str) {
        let path = self.store().absolute_package_path(location, slug).join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}
