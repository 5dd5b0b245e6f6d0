//! Audit hook for extkit packages.
//!
//! Packages opt in by naming [`ENTRY`] as the `entry` of their manifest. Every
//! lifecycle call is logged and kept in memory so hosts can inspect it.
use std::sync::{Arc, Mutex, PoisonError};

use extkit_core::package_system::{HookContext, HookError, HookRegistry, Lifecycle};
use log::info;

/// Entry symbol the hook is registered under
pub const ENTRY: &str = "core-audit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub phase: &'static str,
    pub slug: String,
    pub version: String,
    pub previous_version: Option<String>,
}

#[derive(Debug, Default)]
pub struct AuditHook {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, phase: &'static str, ctx: &HookContext<'_>) -> Result<(), HookError> {
        if !ctx.package_dir.is_dir() {
            return Err(HookError::Failed(format!(
                "package directory {} does not exist",
                ctx.package_dir.display()
            )));
        }

        match ctx.previous_version {
            Some(previous) => info!("[audit] {} '{}' {} -> {}", phase, ctx.slug, previous, ctx.version),
            None => info!("[audit] {} '{}' {}", phase, ctx.slug, ctx.version),
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AuditEvent {
                phase,
                slug: ctx.slug.to_string(),
                version: ctx.version.to_string(),
                previous_version: ctx.previous_version.map(str::to_string),
            });
        Ok(())
    }
}

impl Lifecycle for AuditHook {
    fn on_install(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        self.record("install", ctx)
    }

    fn on_upgrade(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        self.record("upgrade", ctx)
    }

    fn on_uninstall(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        self.record("uninstall", ctx)
    }
}

/// Register a fresh [`AuditHook`] under [`ENTRY`] and return it
pub fn register(hooks: &HookRegistry) -> Arc<AuditHook> {
    let hook = Arc::new(AuditHook::new());
    hooks.register(ENTRY, hook.clone());
    hook
}
