/// Dashboard defaults and fixed paths

use std::time::Duration;

pub const DEFAULT_ADDRESS: &str = "localhost:8080";
pub const DEFAULT_PAGE_PATH: &str = "/page";
pub const DEFAULT_PAGE_TITLE: &str = "Dynamic page";
pub const DEFAULT_THEME: &str = "macarons";

pub const DEFAULT_VIEWER_NAME: &str = "memory";
pub const DEFAULT_VIEWER_TITLE: &str = "Process memory";
pub const DEFAULT_Y_AXIS_LABEL: &str = "Size";
pub const DEFAULT_Y_AXIS_FORMATTER: &str = "{value} MB";

pub const DEFAULT_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_MAX_POINTS: usize = 30;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// Decimal places kept in viewer payloads
pub const PAYLOAD_PRECISION: u32 = 2;

/// Stand-in for the server's read/write timeouts
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Mounted below the page path
pub const STATICS_DIR: &str = "statics";
pub const VIEWS_DIR: &str = "view";

pub const ECHARTS_ASSET: &str = "echarts.min.js";
/// Fallback location of the library when it is not embedded
pub const ECHARTS_CDN: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/";

/// Every asset route registered under the statics path
pub const STATIC_ASSETS: &[&str] = &[ECHARTS_ASSET, "themes/westeros.js", "themes/macarons.js"];

/// Themes the page can ask ECharts for; the empty string is the built-in default
pub const THEMES: &[&str] = &["", "light", "dark", "westeros", "macarons"];

/// Theme script to load for `theme`, if it is not built into ECharts
pub fn theme_asset(theme: &str) -> Option<String> {
    let asset = format!("themes/{}.js", theme);
    STATIC_ASSETS.contains(&asset.as_str()).then_some(asset)
}

/// Default mount path for a viewer named `name` under `page_path`
pub fn view_path(page_path: &str, name: &str) -> String {
    format!("{}/{}/{}", page_path.trim_end_matches('/'), VIEWS_DIR, name)
}

pub fn statics_path(page_path: &str) -> String {
    format!("{}/{}", page_path.trim_end_matches('/'), STATICS_DIR)
}
