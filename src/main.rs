mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cli::{Cli, Commands, ConfigCommands, ServeArgs};
use live_dashboard::core::{MetricsSource, ProcessMemory};
use live_dashboard::server::{self, views_for_source, Manager};
use live_dashboard::utils::{logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_format)?;

    let config_path = cli.config;

    match cli.command {
        None => handle_serve(AppConfig::load(config_path.as_deref())?, ServeArgs::default()).await?,
        Some(Commands::Serve(args)) => handle_serve(AppConfig::load(config_path.as_deref())?, args).await?,
        Some(Commands::Config { command }) => handle_config(command, config_path.as_deref())?,
    }

    Ok(())
}

async fn handle_serve(mut config: AppConfig, args: ServeArgs) -> Result<()> {
    args.apply(&mut config);

    let root = CancellationToken::new();
    let manager = Arc::new(build_manager(&config, &root)?);

    server::print_banner(
        &config.server.address,
        &config.server.page_path,
        &config.viewer_configs(),
    );

    tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("interrupt received, shutting down"),
                Err(e) => error!(error = %e, "failed to listen for interrupt, shutting down"),
            }
            manager.stop().await;
        }
    });

    manager.start().await.context("Dashboard server failed")?;
    info!("bye");

    Ok(())
}

fn build_manager(config: &AppConfig, root: &CancellationToken) -> Result<Manager> {
    let source: Arc<dyn MetricsSource> =
        Arc::new(ProcessMemory::current().context("Failed to locate the current process")?);

    let views = views_for_source(config.viewer_configs(), source, root)?;

    Ok(Manager::new(config.manager_config(), views, root)?)
}

fn handle_config(command: ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = AppConfig::load(config_path)?;
            let contents = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", contents);
        }
        ConfigCommands::Init { force } => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => AppConfig::default_path()?,
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppConfig::default().save_to(&path)?;
            println!("✓ Wrote default configuration to {}", path.display());
        }
        ConfigCommands::Validate => {
            let config = AppConfig::load(config_path)?;
            let root = CancellationToken::new();
            build_manager(&config, &root)?;
            println!("✓ Configuration is valid ({} viewers)", config.viewers.len());
        }
    }

    Ok(())
}
