//! Shared test utilities

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::post,
};
use switchboard_gateway::{
    ApiServerBuilder, DeviceRegistry, DuplicatePolicy, TelemetryEvent, TelemetryPublisher,
    config::{DEFAULT_MAX_BODY_BYTES, RegistryConfig},
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Device id used by the switch firmware fixtures
pub const SWITCH_ID: &str = "1000a1b2c3";

/// A request as seen by the fake backend
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type CaptureLog = Arc<Mutex<Vec<Captured>>>;
pub type EventLog = Arc<Mutex<Vec<TelemetryEvent>>>;

/// Write a devices file into `dir`
pub fn write_devices(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("devices.json");
    std::fs::write(&path, json).expect("failed to write devices file");
    path
}

/// Devices file JSON with one enabled device pointing at `backend`,
/// one disabled device and one device without a host
pub fn devices_json(backend: SocketAddr) -> String {
    serde_json::json!([
        {"id": SWITCH_ID, "name": "Living room lamp", "host": backend.to_string(), "enable": true},
        {"id": "1000d4e5f6", "name": "Heater", "host": "10.255.0.1:8081", "enable": false},
        {"id": "1000000000", "name": "Unwired", "host": "", "enable": true}
    ])
    .to_string()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });
    addr
}

async fn capture(State(log): State<CaptureLog>, request: Request) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("failed to read backend body");
    let path = parts.uri.path().to_string();
    log.lock().await.push(Captured {
        method: parts.method,
        path: path.clone(),
        query: parts.uri.query().map(String::from),
        headers: parts.headers,
        body,
    });

    (
        StatusCode::CREATED,
        [("x-backend", "fake"), ("content-type", "text/plain")],
        format!("backend saw {path}"),
    )
}

/// Start a fake device backend that records every request
pub async fn spawn_backend() -> (SocketAddr, CaptureLog) {
    let log = CaptureLog::default();
    let app = Router::new().fallback(capture).with_state(log.clone());
    (serve(app).await, log)
}

/// Start a fake MQTT sender answering `/publish` with `status`
pub async fn spawn_sink(status: StatusCode) -> (SocketAddr, EventLog) {
    let log = EventLog::default();
    let app = Router::new()
        .route(
            "/publish",
            post(
                move |State(log): State<EventLog>, Json(event): Json<TelemetryEvent>| async move {
                    log.lock().await.push(event);
                    status
                },
            ),
        )
        .with_state(log.clone());
    (serve(app).await, log)
}

/// An address nothing is listening on
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    listener.local_addr().expect("no local addr")
}

/// Build the gateway router over `devices_file`, optionally publishing to `sink`
pub fn build_router(devices_file: PathBuf, sink: Option<SocketAddr>) -> Router {
    build_router_with_limit(devices_file, sink, DEFAULT_MAX_BODY_BYTES)
}

/// Like [`build_router`] with an explicit body inspection limit
pub fn build_router_with_limit(
    devices_file: PathBuf,
    sink: Option<SocketAddr>,
    max_body_bytes: usize,
) -> Router {
    let registry = DeviceRegistry::from_config(&RegistryConfig {
        devices_file,
        duplicate_ids: DuplicatePolicy::Reject,
        cache_ttl: None,
    });
    let publisher = sink.map(|addr| {
        TelemetryPublisher::new(&addr.to_string(), Duration::from_secs(2))
            .expect("failed to build publisher")
    });

    ApiServerBuilder::new(registry)
        .publisher(publisher)
        .max_body_bytes(max_body_bytes)
        .build()
        .expect("failed to build API server")
        .router()
}
