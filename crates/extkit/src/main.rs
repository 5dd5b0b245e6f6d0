mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use extkit_core::kernel::bootstrap::Application;
use extkit_core::package_system::{DefaultPackageManager, ErrorKind, OperationResult, PackageManager};
use extkit_core::registry::PackageKind;
use extkit_core::storage::ManagerConfig;

use cli::{CliArgs, Commands, ListCommand};

fn load_config(args: &CliArgs) -> Result<ManagerConfig, String> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::load(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => ManagerConfig::for_base_dir("."),
    };
    if let Some(base_dir) = &args.base_dir {
        config.base_dir = base_dir.clone();
    }
    Ok(config)
}

async fn upload(manager: &DefaultPackageManager, archive: &Path, theme: bool) -> OperationResult {
    let bytes = match std::fs::read(archive) {
        Ok(bytes) => bytes,
        Err(e) => {
            return OperationResult {
                success: false,
                message: format!("Cannot read {}: {}", archive.display(), e),
                data: None,
                error_kind: Some(ErrorKind::Io),
            };
        }
    };
    let kind = if theme { PackageKind::Theme } else { PackageKind::Plugin };
    manager.upload(&bytes, kind).await
}

async fn dispatch(manager: &DefaultPackageManager, command: Commands) -> OperationResult {
    match command {
        Commands::List { what } => match what {
            ListCommand::Available => manager.list_available().await,
            ListCommand::Staging => manager.list_staging().await,
            ListCommand::Disabled => manager.list_disabled().await,
            ListCommand::Themes => manager.list_themes().await,
        },
        Commands::Upload { archive, theme } => upload(manager, &archive, theme).await,
        Commands::Install { slug } => manager.install(&slug).await,
        Commands::Uninstall { slug } => manager.uninstall(&slug).await,
        Commands::Enable { slug } => manager.enable(&slug).await,
        Commands::Disable { slug } => manager.disable(&slug).await,
        Commands::Reactivate { slug } => manager.reactivate(&slug).await,
        Commands::RemoveStaged { slug } => manager.remove_from_staging(&slug).await,
        Commands::InstallTheme { slug } => manager.install_theme(&slug).await,
        Commands::ActivateTheme { slug } => manager.activate_theme(&slug).await,
        Commands::Scaffold { slug, name } => manager.scaffold(&slug, &name).await,
        Commands::Verify => manager.verify().await,
        Commands::Reconcile => manager.reconcile().await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the operation result
    if let Err(e) = env_logger::Builder::from_env(Env::default().default_filter_or("warn")).try_init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let args = CliArgs::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let mut app = match Application::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Statically registered lifecycle hooks
    core_audit::register(app.hooks());
    info!("Registered lifecycle hook '{}'", core_audit::ENTRY);

    if let Err(e) = app.run().await {
        eprintln!("Failed to start application: {}", e);
        return ExitCode::FAILURE;
    }

    let manager = app.package_manager().clone();
    let result = dispatch(&manager, args.command).await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Cannot render operation result: {}", e);
            println!("{}", result.message);
        }
    }

    if let Err(e) = app.shutdown().await {
        error!("Shutdown failed: {}", e);
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
