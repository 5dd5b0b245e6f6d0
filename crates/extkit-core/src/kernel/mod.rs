//! # Extkit Kernel
//!
//! Bootstraps the lifecycle manager and owns its long-lived components.
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application)
//!   wires storage, the registry, the hook registry and the package manager
//!   together, runs startup recovery and shuts everything down in order.
//! - **Component Lifecycle**: the [`KernelComponent`](component::KernelComponent)
//!   trait and the [`DependencyRegistry`](component::DependencyRegistry).
//! - **Core Constants**: default layout and file names in [`constants`].
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result` alias.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::{DependencyRegistry, KernelComponent};
pub use error::{Error, KernelLifecyclePhase, Result};
