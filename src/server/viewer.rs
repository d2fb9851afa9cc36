/// Live viewer: one chart, one sampler and the endpoint the chart polls
///
/// Each request to the viewer's path re-arms its sampler's freshness
/// deadline, then answers with the current snapshot as
/// `{"values": [...], "time": "HH:MM:SS"}`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::{MetricsSnapshot, MetricsSource, Sampler, SamplerConfig, SharedSnapshot};
use crate::error::{DashboardError, PayloadError, Result};
use crate::render::{chart_id_for, template, LineChart};
use crate::utils::{is_valid_route_path, is_valid_time_format, round_to, PAYLOAD_PRECISION, THEMES};

/// Client-side polling loop appended to the chart's init script
const VIEW_TEMPLATE: &str = r#"    (function () {
        const chart = window.liveCharts["{{chart_id}}"];
        const maxPoints = {{max_points}};
        function trim(data) {
            while (data.length > maxPoints) {
                data.shift();
            }
        }
        function poll() {
            fetch({{view_url}})
                .then(function (response) {
                    if (!response.ok) {
                        throw new Error("HTTP " + response.status);
                    }
                    return response.json();
                })
                .then(function (metrics) {
                    const option = chart.getOption();
                    option.xAxis[0].data.push(metrics.time);
                    trim(option.xAxis[0].data);
                    option.series.forEach(function (series, i) {
                        series.data.push({ value: metrics.values[i] });
                        trim(series.data);
                    });
                    chart.setOption(option);
                })
                .catch(function (err) {
                    console.warn({{name}}, "poll failed", err);
                });
        }
        setInterval(poll, {{interval}});
    })();"#;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub name: String,
    pub path: String,
    pub title: String,
    pub theme: String,
    pub y_axis_label: String,
    pub y_axis_formatter: String,
    /// Server-side sampling interval
    pub interval: Duration,
    /// Browser polling interval; keep equal to `interval` for a steady cadence
    pub client_interval: Duration,
    /// Points kept on the chart before the oldest is dropped
    pub max_points: usize,
    pub shutdown_timeout: Duration,
    pub time_format: String,
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(DashboardError::config(format!("viewer '{}': {}", self.name, msg)));

        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return fail("name must be non-empty and use only [A-Za-z0-9_-]".to_string());
        }
        if !is_valid_route_path(&self.path) {
            return fail(format!("invalid path '{}'", self.path));
        }
        if self.interval.is_zero() || self.client_interval.is_zero() {
            return fail("intervals must be greater than zero".to_string());
        }
        if self.max_points == 0 {
            return fail("max_points must be greater than zero".to_string());
        }
        if !is_valid_time_format(&self.time_format) {
            return fail(format!("invalid time format '{}'", self.time_format));
        }
        if !THEMES.contains(&self.theme.as_str()) {
            return fail(format!("unknown theme '{}'", self.theme));
        }
        Ok(())
    }
}

/// What the manager needs from a view: a chart for the page, routes for the
/// server and a start/stop lifecycle
pub trait LiveView: Send + Sync {
    fn name(&self) -> &str;

    fn path(&self) -> &str;

    fn chart(&self) -> &LineChart;

    fn routes(self: Arc<Self>) -> Router;

    fn start(&self);

    fn stop(&self) -> BoxFuture<'_, ()>;
}

/// JSON body served to the polling chart
#[derive(Debug, Serialize)]
pub struct Payload {
    pub values: Vec<f64>,
    pub time: String,
}

impl Payload {
    pub fn from_snapshot(snapshot: &MetricsSnapshot, precision: u32) -> std::result::Result<Self, PayloadError> {
        let values = snapshot
            .values
            .iter()
            .enumerate()
            .map(|(index, &value)| {
                let rounded = round_to(value, precision);
                if rounded.is_finite() {
                    Ok(rounded)
                } else {
                    Err(PayloadError::NonFinite { index, value })
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            values,
            time: snapshot.time.clone(),
        })
    }

    pub fn encode(&self) -> std::result::Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub struct Viewer {
    config: ViewerConfig,
    chart: LineChart,
    sampler: Sampler,
    snapshot: SharedSnapshot,
}

impl Viewer {
    pub fn new(
        config: ViewerConfig,
        snapshot: SharedSnapshot,
        source: Arc<dyn MetricsSource>,
        parent: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        debug!(
            viewer = %config.name,
            path = %config.path,
            interval_ms = config.interval.as_millis() as u64,
            "new viewer"
        );

        let chart = build_chart(&config, source.series())?;

        let sampler = Sampler::new(
            SamplerConfig {
                name: config.name.clone(),
                interval: config.interval,
                shutdown_timeout: config.shutdown_timeout,
                time_format: config.time_format.clone(),
            },
            snapshot.clone(),
            source,
            parent,
        );

        Ok(Self {
            config,
            chart,
            sampler,
            snapshot,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn chart(&self) -> &LineChart {
        &self.chart
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn start(&self) {
        info!(viewer = %self.config.name, "viewer start...");
        self.sampler.start();
    }

    pub async fn stop(&self) {
        info!(viewer = %self.config.name, "viewer stop...");
        self.sampler.stop().await;
    }

    /// Mark the viewer as watched and encode the current snapshot
    pub async fn payload(&self) -> std::result::Result<Vec<u8>, PayloadError> {
        self.sampler.notify_accessed();

        let snapshot = self.snapshot.load().await;
        let payload = Payload::from_snapshot(&snapshot, PAYLOAD_PRECISION)?;
        debug!(
            viewer = %self.config.name,
            values = ?payload.values,
            time = %payload.time,
            "new metrics"
        );
        payload.encode()
    }
}

impl LiveView for Viewer {
    fn name(&self) -> &str {
        Viewer::name(self)
    }

    fn path(&self) -> &str {
        Viewer::path(self)
    }

    fn chart(&self) -> &LineChart {
        Viewer::chart(self)
    }

    fn routes(self: Arc<Self>) -> Router {
        let path = self.config.path.clone();
        Router::new()
            .route(&path, get(view_handler))
            .with_state(self)
    }

    fn start(&self) {
        Viewer::start(self)
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        Viewer::stop(self).boxed()
    }
}

/// Build one viewer per config over a single source.
///
/// Every viewer gets its own sampler but they all write the same snapshot, so
/// a request to any of them keeps the shared data fresh.
pub fn views_for_source(
    configs: Vec<ViewerConfig>,
    source: Arc<dyn MetricsSource>,
    parent: &CancellationToken,
) -> Result<Vec<Arc<dyn LiveView>>> {
    let snapshot = SharedSnapshot::new(source.series().len());

    configs
        .into_iter()
        .map(|config| {
            let viewer = Viewer::new(config, snapshot.clone(), Arc::clone(&source), parent)?;
            Ok(Arc::new(viewer) as Arc<dyn LiveView>)
        })
        .collect()
}

async fn view_handler(State(viewer): State<Arc<Viewer>>) -> Response {
    match viewer.payload().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(viewer = %viewer.name(), error = %e, "view payload encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn build_chart(config: &ViewerConfig, series: &[String]) -> Result<LineChart> {
    let mut chart = LineChart::new(chart_id_for(&config.name), config.title.clone(), series.to_vec());
    chart.theme = config.theme.clone();
    chart.y_axis_name = config.y_axis_label.clone();
    chart.y_axis_formatter = config.y_axis_formatter.clone();

    let script = view_script(config, &chart.id).map_err(|source| DashboardError::Template {
        viewer: config.name.clone(),
        source,
    })?;
    chart.add_js_func(script);

    Ok(chart)
}

fn view_script(config: &ViewerConfig, chart_id: &str) -> std::result::Result<String, template::TemplateError> {
    render_view_script(VIEW_TEMPLATE, config, chart_id)
}

fn render_view_script(
    tpl: &str,
    config: &ViewerConfig,
    chart_id: &str,
) -> std::result::Result<String, template::TemplateError> {
    // JSON string literals are valid JS string literals
    let view_url = serde_json::Value::from(config.path.as_str()).to_string();
    let name = serde_json::Value::from(config.name.as_str()).to_string();
    let max_points = config.max_points.to_string();
    let interval = config.client_interval.as_millis().to_string();

    template::render(
        tpl,
        &[
            ("chart_id", chart_id),
            ("max_points", max_points.as_str()),
            ("view_url", view_url.as_str()),
            ("name", name.as_str()),
            ("interval", interval.as_str()),
        ],
    )
}
