use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// extkit: install, toggle and reconcile zip-distributed plugins and themes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Site root every configured path is resolved against
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Layout file (.json, .yaml or .toml); --base-dir overrides its base_dir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List packages
    List {
        #[command(subcommand)]
        what: ListCommand,
    },
    /// Extract a zip package into staging, or into the themes root with --theme
    Upload {
        archive: PathBuf,
        #[arg(long)]
        theme: bool,
    },
    /// Install or upgrade a staged plugin
    Install { slug: String },
    /// Remove a plugin's registration, migrations and published assets
    Uninstall { slug: String },
    Enable { slug: String },
    Disable { slug: String },
    /// Move a disabled plugin back into the active store
    Reactivate { slug: String },
    /// Delete a package from staging
    RemoveStaged { slug: String },
    /// Register an uploaded theme
    InstallTheme { slug: String },
    /// Make a theme the single active theme
    ActivateTheme { slug: String },
    /// Generate an empty plugin skeleton in staging
    Scaffold { slug: String, name: String },
    /// Report drift between the registry and the filesystem
    Verify,
    /// Recover interrupted operations and relocate misplaced plugins
    Reconcile,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ListCommand {
    /// Installed plugins plus unregistered code in the plugins directory
    Available,
    Staging,
    Disabled,
    Themes,
}
