//! # Extkit Utilities
//!
//! Small filesystem helpers shared by the storage layer: recursive copies,
//! file discovery and size accounting.
pub mod fs;

pub use fs::{copy_dir_all, dir_size, find_files, find_files_with_extension};
