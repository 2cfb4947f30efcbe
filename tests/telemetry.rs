//! Telemetry export against a local write endpoint

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use mesh_gateway::InfluxExporter;
use mesh_gateway::config::TelemetryConfig;
use mesh_gateway::shutdown;
use tokio::net::TcpListener;

mod common;
use common::{VALID_REPORT, node, setup_gateway};

#[derive(Debug, Default)]
struct Captured {
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: String,
}

type Shared = Arc<Mutex<Option<Captured>>>;

async fn capture_write(
    State(shared): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *shared.lock().unwrap() = Some(Captured {
        query,
        authorization,
        body,
    });
    StatusCode::NO_CONTENT
}

/// Start a write endpoint that records the last request it saw
async fn start_store(status_ok: bool) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(None));
    let app = if status_ok {
        Router::new()
            .route("/api/v2/write", post(capture_write))
            .with_state(shared.clone())
    } else {
        Router::new().route(
            "/api/v2/write",
            post(|| async { (StatusCode::UNAUTHORIZED, "unauthorized access") }),
        )
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), shared)
}

fn telemetry_config(url: String) -> TelemetryConfig {
    TelemetryConfig {
        url,
        org: "omni".to_string(),
        bucket: "mesh".to_string(),
        token: Some("secret".to_string()),
        measurement: "mesh_sensor".to_string(),
        interval: Duration::from_secs(15),
    }
}

#[tokio::test]
async fn test_export_writes_line_protocol() {
    let (url, shared) = start_store(true).await;
    let gateway = setup_gateway();
    gateway
        .handler
        .handle(node(0xa1), VALID_REPORT.as_bytes())
        .unwrap();

    let exporter = InfluxExporter::new(&telemetry_config(url), Duration::from_secs(30)).unwrap();
    let written = exporter.export(&gateway.registry).await.unwrap();
    assert_eq!(written, 1);

    let captured = shared.lock().unwrap().take().unwrap();
    assert_eq!(captured.query["org"], "omni");
    assert_eq!(captured.query["bucket"], "mesh");
    assert_eq!(captured.query["precision"], "ms");
    assert_eq!(captured.authorization.as_deref(), Some("Token secret"));
    assert!(
        captured
            .body
            .starts_with("mesh_sensor,address=fd00::a1,identity=abc123 ")
    );
    assert!(captured.body.contains("temperature=21i"));
    assert!(captured.body.contains("cal2=7i"));
    assert!(captured.body.contains("alive=true"));
}

#[tokio::test]
async fn test_export_with_no_devices_skips_write() {
    let (url, shared) = start_store(true).await;
    let gateway = setup_gateway();

    let exporter = InfluxExporter::new(&telemetry_config(url), Duration::from_secs(30)).unwrap();
    assert_eq!(exporter.export(&gateway.registry).await.unwrap(), 0);
    assert!(shared.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_write_is_an_error() {
    let (url, _) = start_store(false).await;
    let gateway = setup_gateway();
    gateway
        .handler
        .handle(node(0xa1), VALID_REPORT.as_bytes())
        .unwrap();

    let exporter = InfluxExporter::new(&telemetry_config(url), Duration::from_secs(30)).unwrap();
    let err = exporter.export(&gateway.registry).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

/// Start a write endpoint that refuses the first `failures` writes
async fn start_flaky_store(failures: usize) -> (String, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/api/v2/write",
            post(move |State(attempts): State<Arc<AtomicUsize>>| async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < failures {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::NO_CONTENT
                }
            }),
        )
        .with_state(attempts.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), attempts)
}

#[tokio::test]
async fn test_export_loop_keeps_running_after_failures() {
    let (url, attempts) = start_flaky_store(2).await;
    let gateway = setup_gateway();
    gateway
        .handler
        .handle(node(0xa1), VALID_REPORT.as_bytes())
        .unwrap();

    let exporter = InfluxExporter::new(&telemetry_config(url), Duration::from_secs(30)).unwrap();
    let (tx, rx) = shutdown::channel();
    let handle = exporter.spawn(gateway.registry.clone(), Duration::from_millis(10), rx);

    // Two refused writes, then at least two accepted ones
    tokio::time::timeout(Duration::from_secs(5), async {
        while attempts.load(Ordering::SeqCst) < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(!handle.is_finished());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
