//! Package lifecycle hooks.
//!
//! Packages never have code loaded by name at runtime. A host registers each
//! [`Lifecycle`] implementation under an entry symbol in the [`HookRegistry`]
//! owned by the application context, and a package's manifest names that
//! symbol (defaulting to its slug).
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::package_system::error::HookError;

/// What a hook gets to see about the package it runs for
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub slug: &'a str,
    pub version: &'a str,
    /// Set on upgrade
    pub previous_version: Option<&'a str>,
    pub config: &'a Value,
    /// Absolute path of the package code
    pub package_dir: &'a Path,
}

pub trait Lifecycle: Send + Sync {
    fn on_install(&self, ctx: &HookContext<'_>) -> Result<(), HookError>;

    /// Runs instead of `on_install` when an installed package is replaced
    fn on_upgrade(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        self.on_install(ctx)
    }

    fn on_uninstall(&self, ctx: &HookContext<'_>) -> Result<(), HookError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Install,
    Upgrade,
    Uninstall,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Install => "on_install",
            HookPhase::Upgrade => "on_upgrade",
            HookPhase::Uninstall => "on_uninstall",
        }
    }
}

/// Result of invoking a hook; never an error for the surrounding operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HookOutcome {
    NotRegistered,
    Ok,
    Failed { message: String },
    Panicked { message: String },
}

impl HookOutcome {
    /// Warning text for failed or panicked hooks
    pub fn warning(&self, slug: &str, phase: HookPhase) -> Option<String> {
        match self {
            HookOutcome::Failed { message } => Some(format!("{} hook of '{}' failed: {}", phase.as_str(), slug, message)),
            HookOutcome::Panicked { message } => {
                Some(format!("{} hook of '{}' panicked: {}", phase.as_str(), slug, message))
            }
            _ => None,
        }
    }
}

/// Explicitly constructed table of lifecycle hooks keyed by entry symbol
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<String, Arc<dyn Lifecycle>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` under `entry`; returns true when it replaced another hook
    pub fn register(&self, entry: &str, hook: Arc<dyn Lifecycle>) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = hooks.insert(entry.to_string(), hook).is_some();
        if replaced {
            log::warn!("Lifecycle hook '{}' replaced", entry);
        } else {
            log::debug!("Lifecycle hook '{}' registered", entry);
        }
        replaced
    }

    pub fn unregister(&self, entry: &str) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        hooks.remove(entry).is_some()
    }

    pub fn resolve(&self, entry: &str) -> Option<Arc<dyn Lifecycle>> {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        hooks.get(entry).cloned()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.resolve(entry).is_some()
    }

    /// Sorted entry symbols
    pub fn entries(&self) -> Vec<String> {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<String> = hooks.keys().cloned().collect();
        entries.sort();
        entries
    }

    pub fn clear(&self) {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        hooks.clear();
    }

    /// Run the hook registered under `entry` for `phase`, catching panics
    pub fn invoke(&self, entry: &str, phase: HookPhase, ctx: &HookContext<'_>) -> HookOutcome {
        let Some(hook) = self.resolve(entry) else {
            log::debug!("No lifecycle hook registered for '{}'", entry);
            return HookOutcome::NotRegistered;
        };

        log::info!("Running {} hook '{}' for '{}'", phase.as_str(), entry, ctx.slug);
        let result = panic::catch_unwind(AssertUnwindSafe(|| match phase {
            HookPhase::Install => hook.on_install(ctx),
            HookPhase::Upgrade => hook.on_upgrade(ctx),
            HookPhase::Uninstall => hook.on_uninstall(ctx),
        }));

        let outcome = match result {
            Ok(Ok(())) => HookOutcome::Ok,
            Ok(Err(e)) => HookOutcome::Failed { message: e.to_string() },
            Err(payload) => HookOutcome::Panicked {
                message: panic_message(payload.as_ref()),
            },
        };
        if let Some(warning) = outcome.warning(ctx.slug, phase) {
            log::warn!("{}", warning);
        }
        outcome
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry").field("entries", &self.entries()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
