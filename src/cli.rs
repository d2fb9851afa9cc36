/// CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use live_dashboard::utils::logging::LogFormat;
use live_dashboard::utils::AppConfig;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "live-dashboard")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the dashboard (default)
    Serve(ServeArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args, Default)]
pub struct ServeArgs {
    /// Address to bind, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    pub address: Option<String>,

    /// Path the dashboard page is served on
    #[arg(long)]
    pub page_path: Option<String>,

    /// Sampling interval for every viewer, in milliseconds
    #[arg(short, long)]
    pub interval_ms: Option<u64>,

    /// Points kept on each chart
    #[arg(long)]
    pub max_points: Option<usize>,

    /// Seconds to wait for the server and samplers to stop
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,
}

impl ServeArgs {
    /// Apply command line overrides on top of the loaded config
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(page_path) = &self.page_path {
            config.server.page_path = page_path.clone();
        }
        if let Some(secs) = self.shutdown_timeout {
            config.server.shutdown_timeout_secs = secs;
        }
        for viewer in &mut config.viewers {
            if let Some(interval_ms) = self.interval_ms {
                viewer.interval_ms = interval_ms;
                viewer.client_interval_ms = None;
            }
            if let Some(max_points) = self.max_points {
                viewer.max_points = max_points;
            }
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate configuration
    Validate,
}
