pub mod kernel;
pub mod package_system;
pub mod registry;
pub mod storage;
pub mod utils;

// Re-export key public types/traits for the binary and hook crates
pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use package_system::{
    HookContext, HookError, Lifecycle, OperationResult, PackageError, PackageManager,
};
pub use registry::{InstalledRecord, PackageKind};
pub use storage::{ManagerConfig, StorageProvider};

#[cfg(test)]
mod tests;
