use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::{Error, Result};

/// Lifecycle implemented by every long-lived service the kernel owns
#[async_trait]
pub trait KernelComponent: Any + Send + Sync + Debug {
    fn name(&self) -> &'static str;
    async fn initialize(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

struct Entry {
    component: Arc<dyn KernelComponent>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Components keyed by concrete type, remembering registration order.
///
/// The order doubles as the initialize/start order; shutdown walks it backwards.
#[derive(Default)]
pub struct DependencyRegistry {
    instances: HashMap<TypeId, Entry>,
    order: Vec<TypeId>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component; registering the same concrete type twice is an error
    pub fn register_instance<V>(&mut self, instance: Arc<V>) -> Result<()>
    where
        V: KernelComponent + 'static,
    {
        let type_id = TypeId::of::<V>();
        if self.instances.contains_key(&type_id) {
            return Err(Error::ComponentRegistryError {
                operation: "register_instance".to_string(),
                component_name: Some(instance.name().to_string()),
                message: "component type already registered".to_string(),
            });
        }
        self.instances.insert(
            type_id,
            Entry {
                component: instance.clone(),
                any: instance,
            },
        );
        self.order.push(type_id);
        Ok(())
    }

    /// Get a component by concrete type
    pub fn get_concrete<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        self.instances
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::downcast::<T>(entry.any.clone()).ok())
    }

    /// Components in registration order
    pub fn components(&self) -> Vec<Arc<dyn KernelComponent>> {
        self.order
            .iter()
            .filter_map(|id| self.instances.get(id))
            .map(|entry| entry.component.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.order.clear();
    }
}

impl Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.components().iter().map(|c| c.name()))
            .finish()
    }
}
