/// Manager: one page, many live views, one HTTP server
///
/// Construction freezes the route table. `start` starts every view and then
/// serves until `stop`, which stops the views before closing the listener so
/// no handler runs against a torn-down sampler.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::statics;
use super::viewer::LiveView;
use crate::error::{DashboardError, Result};
use crate::render::Page;
use crate::utils::{
    is_valid_route_path, statics_path, theme_asset, ECHARTS_ASSET, REQUEST_TIMEOUT, STATIC_ASSETS,
};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// `host:port` to bind
    pub address: String,
    pub page_path: String,
    pub title: String,
    pub shutdown_timeout: Duration,
    /// Where the page loads the charting library from; the embedded statics
    /// when unset
    pub assets_host: Option<String>,
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(DashboardError::config("address must not be empty"));
        }
        if !is_valid_route_path(&self.page_path) || (self.page_path.len() > 1 && self.page_path.ends_with('/')) {
            return Err(DashboardError::config(format!(
                "invalid page path '{}'",
                self.page_path
            )));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(DashboardError::config("shutdown timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn statics_path(&self) -> String {
        statics_path(&self.page_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Serving,
    Stopped,
}

pub struct Manager {
    config: ManagerConfig,
    views: Vec<Arc<dyn LiveView>>,
    page: Arc<Page>,
    router: Router,
    /// Derived from the caller's token, cancelled last on stop
    cancel: CancellationToken,
    /// Fires the server's graceful shutdown
    shutdown: CancellationToken,
    /// Cancelled once the server future has returned
    server_done: CancellationToken,
    /// Held while views are started or stopped so the two never interleave
    lifecycle: Mutex<Lifecycle>,
}

impl Manager {
    pub fn new(
        config: ManagerConfig,
        views: Vec<Arc<dyn LiveView>>,
        parent: &CancellationToken,
    ) -> Result<Self> {
        debug!(
            address = %config.address,
            page_path = %config.page_path,
            viewers = views.len(),
            shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
            "new manager"
        );

        config.validate()?;
        let statics_path = config.statics_path();
        check_routes(&config.page_path, &statics_path, &views)?;

        let cancel = parent.child_token();

        let page = build_page(&config, &statics_path, &views);
        page.render()?;
        let page = Arc::new(page);

        let router = build_router(&config.page_path, &statics_path, Arc::clone(&page), &views);

        Ok(Self {
            config,
            views,
            page,
            router,
            cancel,
            shutdown: CancellationToken::new(),
            server_done: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// The frozen route table, for serving elsewhere or in-process tests
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Token cancelled once `stop` has finished
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bind the configured address and serve until stopped
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.address)
            .await
            .map_err(|source| DashboardError::Bind {
                address: self.config.address.clone(),
                source,
            })?;

        self.start_with_listener(listener).await
    }

    /// Start every view, then serve on `listener` until stopped.
    ///
    /// Returns at once, without starting anything, once `stop` has run or
    /// while another call is already serving.
    pub async fn start_with_listener(&self, listener: TcpListener) -> Result<()> {
        let address = listener.local_addr().map_err(DashboardError::LocalAddr)?;

        {
            let mut lifecycle = self.lifecycle.lock().await;
            match *lifecycle {
                Lifecycle::Stopped => {
                    warn!("manager already stopped, not starting");
                    return Ok(());
                }
                Lifecycle::Serving => {
                    warn!("manager already serving");
                    return Ok(());
                }
                Lifecycle::Idle => {}
            }

            info!("start...");
            for view in &self.views {
                view.start();
            }
            *lifecycle = Lifecycle::Serving;
        }

        info!(
            page = %format!("http://{}{}", address, self.config.page_path),
            "serving dashboard"
        );

        let shutdown = self.shutdown.clone();
        let result = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        self.server_done.cancel();

        result.map_err(|source| DashboardError::Serve { address, source })
    }

    /// Stop views, then the HTTP server, then cancel the derived token
    pub async fn stop(&self) {
        let was_serving = {
            let mut lifecycle = self.lifecycle.lock().await;
            if *lifecycle == Lifecycle::Stopped {
                debug!("manager already stopped");
                return;
            }
            info!("stop...");

            let was_serving = *lifecycle == Lifecycle::Serving;
            if was_serving {
                info!("stop producing new data before stopping ingestion");
                join_all(self.views.iter().map(|view| view.stop())).await;
            }
            *lifecycle = Lifecycle::Stopped;
            was_serving
        };

        self.shutdown.cancel();
        if was_serving {
            match timeout(self.config.shutdown_timeout, self.server_done.cancelled()).await {
                Ok(()) => info!("HTTP server stopped"),
                Err(_) => warn!(
                    timeout_secs = self.config.shutdown_timeout.as_secs(),
                    "error shutting down HTTP server: graceful shutdown timed out"
                ),
            }
        }

        self.cancel.cancel();
    }
}

/// Reject duplicate routes up front; axum would panic on them
fn check_routes(page_path: &str, statics_path: &str, views: &[Arc<dyn LiveView>]) -> Result<()> {
    let mut seen = HashSet::new();
    seen.insert(page_path.to_string());
    for asset in STATIC_ASSETS {
        seen.insert(statics::asset_path(statics_path, asset));
    }

    let mut names = HashSet::new();
    for view in views {
        if !names.insert(view.name().to_string()) {
            return Err(DashboardError::config(format!(
                "duplicate viewer name '{}'",
                view.name()
            )));
        }
        if !is_valid_route_path(view.path()) {
            return Err(DashboardError::config(format!(
                "viewer '{}': invalid path '{}'",
                view.name(),
                view.path()
            )));
        }
        if !seen.insert(view.path().to_string()) {
            return Err(DashboardError::config(format!(
                "viewer '{}': path '{}' is already in use",
                view.name(),
                view.path()
            )));
        }
    }
    Ok(())
}

fn build_page(config: &ManagerConfig, statics_path: &str, views: &[Arc<dyn LiveView>]) -> Page {
    let mut page = Page::new(config.title.clone(), format!("{}/", statics_path));

    page.js_assets.push(match &config.assets_host {
        Some(host) => format!("{}{}", host, ECHARTS_ASSET),
        None => ECHARTS_ASSET.to_string(),
    });

    info!(viewers = views.len(), "registering viewers");
    for view in views {
        let chart = view.chart();
        info!(
            viewer = %view.name(),
            path = %view.path(),
            chart_id = %chart.id,
            "registering viewer"
        );

        if let Some(asset) = theme_asset(&chart.theme) {
            if !page.js_assets.contains(&asset) {
                page.js_assets.push(asset);
            }
        }
        page.add_chart(chart.clone());
    }

    debug!(title = %page.title, assets_host = %page.assets_host, "setup page");
    page
}

fn build_router(
    page_path: &str,
    statics_path: &str,
    page: Arc<Page>,
    views: &[Arc<dyn LiveView>],
) -> Router {
    let mut router = Router::new()
        .route(page_path, get(page_handler))
        .with_state(page);
    debug!(path = %page_path, "listening");

    for view in views {
        router = router.merge(Arc::clone(view).routes());
        debug!(path = %view.path(), "listening");
    }

    router = router.merge(statics::routes(statics_path));
    debug!(path = %statics_path, assets = STATIC_ASSETS.len(), "listening");

    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
}

async fn page_handler(State(page): State<Arc<Page>>) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "page rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "page rendering failed").into_response()
        }
    }
}
