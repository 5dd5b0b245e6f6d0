use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::package_system::error::HookError;
use crate::package_system::lifecycle::{HookContext, HookOutcome, HookPhase, HookRegistry, Lifecycle};

#[derive(Default)]
struct RecordingHook {
    calls: Mutex<Vec<String>>,
}

impl RecordingHook {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Lifecycle for RecordingHook {
    fn on_install(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        self.calls.lock().unwrap().push(format!("install:{}", ctx.version));
        Ok(())
    }

    fn on_uninstall(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        self.calls.lock().unwrap().push(format!("uninstall:{}", ctx.slug));
        Ok(())
    }
}

struct FailingHook;

impl Lifecycle for FailingHook {
    fn on_install(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Err(HookError::Failed("seed data rejected".to_string()))
    }

    fn on_uninstall(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        panic!("uninstall exploded");
    }
}

fn context<'a>(config: &'a serde_json::Value, previous: Option<&'a str>) -> HookContext<'a> {
    HookContext {
        slug: "shop",
        version: "2.0.0",
        previous_version: previous,
        config,
        package_dir: Path::new("/tmp/shop"),
    }
}

#[test]
fn test_register_replace_and_unregister() {
    let registry = HookRegistry::new();
    assert!(!registry.register("shop", Arc::new(RecordingHook::default())));
    assert!(registry.register("shop", Arc::new(RecordingHook::default())));
    assert!(!registry.register("arena", Arc::new(FailingHook)));

    assert_eq!(registry.entries(), vec!["arena", "shop"]);
    assert!(registry.unregister("arena"));
    assert!(!registry.unregister("arena"));
    assert!(registry.contains("shop"));

    registry.clear();
    assert!(registry.entries().is_empty());
}

#[test]
fn test_invoke_dispatches_by_phase() {
    let registry = HookRegistry::new();
    let hook = Arc::new(RecordingHook::default());
    registry.register("shop", hook.clone());
    let config = json!({});

    assert_eq!(registry.invoke("shop", HookPhase::Install, &context(&config, None)), HookOutcome::Ok);
    // Upgrade falls back to on_install
    assert_eq!(
        registry.invoke("shop", HookPhase::Upgrade, &context(&config, Some("1.0.0"))),
        HookOutcome::Ok
    );
    assert_eq!(registry.invoke("shop", HookPhase::Uninstall, &context(&config, None)), HookOutcome::Ok);

    assert_eq!(hook.calls(), vec!["install:2.0.0", "install:2.0.0", "uninstall:shop"]);
    assert_eq!(
        registry.invoke("missing", HookPhase::Install, &context(&config, None)),
        HookOutcome::NotRegistered
    );
}

#[test]
fn test_invoke_contains_failures_and_panics() {
    let registry = HookRegistry::new();
    registry.register("shop", Arc::new(FailingHook));
    let config = json!({});

    let failed = registry.invoke("shop", HookPhase::Install, &context(&config, None));
    assert!(matches!(&failed, HookOutcome::Failed { message } if message.contains("seed data")));
    assert!(failed.warning("shop", HookPhase::Install).is_some());

    let panicked = registry.invoke("shop", HookPhase::Uninstall, &context(&config, None));
    assert!(matches!(&panicked, HookOutcome::Panicked { message } if message.contains("exploded")));
    assert!(HookOutcome::Ok.warning("shop", HookPhase::Install).is_none());
}
