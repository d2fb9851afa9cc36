/// Application configuration management
/// Stores dashboard settings in ~/.config/live-dashboard/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::*;
use crate::server::{ManagerConfig, ViewerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub viewers: Vec<ViewerSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub address: String,
    pub page_path: String,
    pub title: String,
    /// Chart theme used by every viewer that does not set its own
    pub theme: String,
    pub shutdown_timeout_secs: u64,
    /// Serve scripts from here instead of the embedded statics, e.g. a CDN
    pub assets_host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSection {
    pub name: String,
    /// Defaults to `<page_path>/view/<name>`
    pub path: Option<String>,
    pub title: String,
    pub theme: Option<String>,
    pub y_axis_label: String,
    pub y_axis_formatter: String,
    pub interval_ms: u64,
    /// Browser polling interval, defaults to `interval_ms`
    pub client_interval_ms: Option<u64>,
    pub max_points: usize,
    pub time_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            viewers: vec![ViewerSection::default()],
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            page_path: DEFAULT_PAGE_PATH.to_string(),
            title: DEFAULT_PAGE_TITLE.to_string(),
            theme: DEFAULT_THEME.to_string(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            assets_host: None,
        }
    }
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_VIEWER_NAME.to_string(),
            path: None,
            title: DEFAULT_VIEWER_TITLE.to_string(),
            theme: None,
            y_axis_label: DEFAULT_Y_AXIS_LABEL.to_string(),
            y_axis_formatter: DEFAULT_Y_AXIS_FORMATTER.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            client_interval_ms: None,
            max_points: DEFAULT_MAX_POINTS,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl AppConfig {
    /// Get default config file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine the user config directory")?;

        Ok(config_dir.join("live-dashboard").join("config.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            address: self.server.address.clone(),
            page_path: self.server.page_path.clone(),
            title: self.server.title.clone(),
            shutdown_timeout: Duration::from_secs(self.server.shutdown_timeout_secs),
            assets_host: self.server.assets_host.clone(),
        }
    }

    pub fn viewer_configs(&self) -> Vec<ViewerConfig> {
        self.viewers
            .iter()
            .map(|v| ViewerConfig {
                name: v.name.clone(),
                path: v
                    .path
                    .clone()
                    .unwrap_or_else(|| view_path(&self.server.page_path, &v.name)),
                title: v.title.clone(),
                theme: v.theme.clone().unwrap_or_else(|| self.server.theme.clone()),
                y_axis_label: v.y_axis_label.clone(),
                y_axis_formatter: v.y_axis_formatter.clone(),
                interval: Duration::from_millis(v.interval_ms),
                client_interval: Duration::from_millis(v.client_interval_ms.unwrap_or(v.interval_ms)),
                max_points: v.max_points,
                shutdown_timeout: Duration::from_secs(self.server.shutdown_timeout_secs),
                time_format: v.time_format.clone(),
            })
            .collect()
    }
}
