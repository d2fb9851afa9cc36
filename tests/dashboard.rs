//! End-to-end checks against a real listener

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use live_dashboard::core::{MetricsSource, SharedSnapshot};
use live_dashboard::error::SourceError;
use live_dashboard::server::{LiveView, Manager, ManagerConfig, Viewer, ViewerConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Counter {
    series: Vec<String>,
    calls: AtomicU64,
}

impl MetricsSource for Counter {
    fn series(&self) -> &[String] {
        &self.series
    }

    fn sample(&self) -> Result<Vec<f64>, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(vec![n as f64 * 1.5, 100.0 / 3.0])
    }
}

struct Dashboard {
    manager: Arc<Manager>,
    server: JoinHandle<live_dashboard::Result<()>>,
    snapshot: SharedSnapshot,
    addr: SocketAddr,
}

impl Dashboard {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn launch() -> Dashboard {
    let parent = CancellationToken::new();
    let source = Arc::new(Counter {
        series: vec!["Counter".to_string(), "Third".to_string()],
        calls: AtomicU64::new(0),
    });
    let snapshot = SharedSnapshot::new(2);

    let viewer = Viewer::new(
        ViewerConfig {
            name: "counter".to_string(),
            path: "/page/view/counter".to_string(),
            title: "Counter".to_string(),
            theme: "westeros".to_string(),
            y_axis_label: "Count".to_string(),
            y_axis_formatter: "{value}".to_string(),
            interval: Duration::from_millis(100),
            client_interval: Duration::from_millis(100),
            max_points: 30,
            shutdown_timeout: Duration::from_secs(1),
            time_format: "%H:%M:%S%.3f".to_string(),
        },
        snapshot.clone(),
        source,
        &parent,
    )
    .unwrap();

    let manager = Arc::new(
        Manager::new(
            ManagerConfig {
                address: "127.0.0.1:0".to_string(),
                page_path: "/page".to_string(),
                title: "Dynamic page".to_string(),
                shutdown_timeout: Duration::from_secs(1),
                assets_host: None,
            },
            vec![Arc::new(viewer) as Arc<dyn LiveView>],
            &parent,
        )
        .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.start_with_listener(listener).await }
    });

    Dashboard {
        manager,
        server,
        snapshot,
        addr,
    }
}

async fn poll(client: &reqwest::Client, url: &str) -> Value {
    let response = client.get(url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "application/json"
    );
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_sampling_follows_viewers() {
    let dashboard = launch().await;
    let client = reqwest::Client::new();
    let view = dashboard.url("/page/view/counter");

    let mut body = poll(&client, &view).await;
    while body["time"].as_str().unwrap().is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
        body = poll(&client, &view).await;
    }
    assert_eq!(body["values"].as_array().unwrap().len(), 2);
    assert_eq!(body["values"][1], 33.33);

    // Nobody is watching: the snapshot goes quiet
    tokio::time::sleep(Duration::from_millis(500)).await;
    let idle = dashboard.snapshot.load().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(dashboard.snapshot.load().await.sequence, idle.sequence);

    // First request after the pause answers with the stale data...
    let stale = poll(&client, &view).await;
    assert_eq!(stale["time"], idle.time.as_str());

    // ...and wakes the sampler up. Wait past the next tick and then some: a
    // 100 ms interval means a shorter pause can land before any tick fires.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let fresh = poll(&client, &view).await;
    assert_ne!(fresh["time"], stale["time"]);
    assert!(dashboard.snapshot.load().await.sequence > idle.sequence);

    dashboard.manager.stop().await;
    let result = tokio::time::timeout(Duration::from_secs(2), dashboard.server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert!(client.get(&view).send().await.is_err());
}

#[tokio::test]
async fn test_page_and_statics_over_http() {
    let dashboard = launch().await;
    let client = reqwest::Client::new();

    let response = client.get(dashboard.url("/page")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let html = response.text().await.unwrap();
    assert!(html.contains("<title>Dynamic page</title>"));
    assert!(html.contains(r#"id="live_counter""#));
    assert!(html.contains("/page/statics/themes/westeros.js"));
    assert!(html.contains(r#"fetch("/page/view/counter")"#));

    let response = client
        .get(dashboard.url("/page/statics/themes/westeros.js"))
        .header(reqwest::header::ORIGIN, "http://elsewhere.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );

    let response = client.get(dashboard.url("/nope")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    dashboard.manager.stop().await;
    dashboard.server.await.unwrap().unwrap();
}
