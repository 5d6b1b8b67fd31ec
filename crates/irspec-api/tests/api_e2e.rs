//! End-to-end tests for the gateway
//!
//! Each test writes a modules root and hardware configuration into a temp
//! directory, builds the full app from them, serves it on an ephemeral port
//! and talks to it over HTTP. The multiplexer runs on simulated firmware and
//! the laser on the simulated SDK.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use irspec_api::{build_app, HardwareConfig, ModuleContext};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

// =============================================================================
// Test server
// =============================================================================

const HARDWARE_CONFIG: &str = r#"
[arduino_uno_r4]
port = "sim0"
transport = "mock"
settle_ms = 0
timeout = 0.5

[daylight_mircat]
driver = "simulated"
on_interlock_failure = "error"
on_busy = "reject"
max_wait_secs = 30
arm_poll_ms = 10
tec_poll_ms = 5
tune_poll_ms = 5
emission_poll_ms = 5
scan_poll_ms = 5
"#;

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    _root: TempDir,
}

impl TestServer {
    async fn start(root: TempDir) -> Self {
        let mut config = HardwareConfig::from_toml_str(HARDWARE_CONFIG).unwrap();
        config.server.modules_dir = root.path().join("modules");
        config.server.static_dir = root.path().join("static");
        let app = build_app(&ModuleContext::new(Arc::new(config)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Self {
            addr,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            shutdown_tx: Some(shutdown_tx),
            _root: root,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn write_module(root: &Path, name: &str, routes: Option<&str>) {
    let dir = root.join("modules").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    if let Some(routes) = routes {
        std::fs::write(dir.join("routes.toml"), routes).unwrap();
    }
}

/// Both hardware modules plus directories discovery must ignore
fn standard_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    write_module(
        root.path(),
        "arduino_uno_r4",
        Some("router = \"arduino_uno_r4_router\"\nprefix = \"/api/arduino\""),
    );
    write_module(
        root.path(),
        "daylight_mircat",
        Some("router = \"daylight_mircat_router\"\nprefix = \"/api/mircat\""),
    );
    write_module(root.path(), "experiment", None);
    write_module(root.path(), "__pycache__", Some("router = \"x_router\""));
    root
}

async fn standard_server() -> TestServer {
    TestServer::start(standard_root()).await
}

// =============================================================================
// System endpoints
// =============================================================================

#[tokio::test]
async fn test_health_and_modules() {
    let server = standard_server().await;

    let (status, body) = server.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(
        body["message"],
        "IR Spectroscopy Control Interface API is running"
    );
    assert_eq!(body["data"]["modules_loaded"], 2);

    let (status, body) = server.get("/api/modules").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "modules": ["arduino_uno_r4", "daylight_mircat"], "count": 2 })
    );

    let (_, body) = server.get("/api/system/info").await;
    assert_eq!(
        body["data"]["application"],
        "IR Pump-Probe Spectroscopy Control Interface"
    );
    assert_eq!(body["data"]["version"], "1.0.0");
    assert_eq!(body["data"]["api_base"], "/api");
}

#[tokio::test]
async fn test_missing_modules_root() {
    let server = TestServer::start(tempfile::tempdir().unwrap()).await;

    let (status, body) = server.get("/api/modules").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);

    let (status, body) = server.get("/api/arduino/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Endpoint not found");
}

// =============================================================================
// Multiplexer controller
// =============================================================================

#[tokio::test]
async fn test_arduino_position_flow() {
    let server = standard_server().await;

    let (status, body) = server.get("/api/arduino/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connected"], false);
    assert_eq!(body["data"]["current_position"], Value::Null);
    assert_eq!(body["data"]["port"], "sim0");
    assert_eq!(body["data"]["device_type"], "Arduino Uno R4 Minima");

    let (status, body) = server.post("/api/arduino/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Connected to Arduino");
    assert_eq!(body["data"]["connected"], true);

    let (status, body) = server
        .post("/api/arduino/mux/position", Some(json!({ "position": 5 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "MUX position set to 5");
    assert_eq!(
        body["data"],
        json!({ "current_position": 5, "target_position": 5 })
    );

    let (_, body) = server.get("/api/arduino/mux/position").await;
    assert_eq!(body["data"]["current_position"], 5);

    let (_, body) = server.get("/api/arduino/status").await;
    assert_eq!(body["data"]["connected"], true);
    assert_eq!(body["data"]["current_position"], 5);

    let (_, body) = server.get("/api/arduino/mux/positions").await;
    assert_eq!(
        body["data"],
        json!({ "positions": [1, 2, 3, 4, 5, 6, 7, 8], "min_position": 1, "max_position": 8 })
    );

    let (status, body) = server.post("/api/arduino/disconnect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connected"], false);

    let (_, body) = server.get("/api/arduino/status").await;
    assert_eq!(body["data"]["current_position"], Value::Null);
}

#[tokio::test]
async fn test_arduino_rejects_bad_positions() {
    let server = standard_server().await;
    server.post("/api/arduino/connect", None).await;

    let (status, body) = server
        .post("/api/arduino/mux/position", Some(json!({ "position": "abc" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Invalid position value");

    let (status, _) = server
        .post("/api/arduino/mux/position", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.post("/api/arduino/mux/position", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .post("/api/arduino/mux/position", Some(json!({ "position": 9 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Position 9 out of range (1-8)");
}

#[tokio::test]
async fn test_arduino_requires_connection() {
    let server = standard_server().await;

    let (status, body) = server
        .post("/api/arduino/mux/position", Some(json!({ "position": 2 })))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");

    let (status, _) = server.get("/api/arduino/mux/position").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Laser
// =============================================================================

#[tokio::test]
async fn test_mircat_procedure() {
    let server = standard_server().await;

    let (status, body) = server.post("/api/mircat/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connected"], true);

    let (status, body) = server.post("/api/mircat/arm", None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["armed"], true);

    let (status, body) = server
        .post(
            "/api/mircat/tune",
            Some(json!({ "wavelength": 7.0, "units": "microns", "qcl": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["actual"]["wavelength"], 7.0);

    let (status, body) = server
        .post("/api/mircat/emission", Some(json!({ "on": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emitting"], true);

    let (status, body) = server
        .post(
            "/api/mircat/scan",
            Some(json!({ "mode": "sweep", "start": 6.7, "stop": 7.2, "speed": 0.1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["mode"], "sweep");
    assert_eq!(body["data"]["final_status"]["percent"], 100);

    let (_, body) = server.get("/api/mircat/status").await;
    assert_eq!(body["data"]["connected"], true);
    assert_eq!(body["data"]["busy"], false);
    assert_eq!(body["data"]["armed"], true);

    let (_, body) = server.post("/api/mircat/cancel", None).await;
    assert_eq!(body["data"]["cancelled"], false);

    let (status, body) = server.post("/api/mircat/disarm", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["armed"], false);

    let (status, body) = server.post("/api/mircat/disconnect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connected"], false);
}

#[tokio::test]
async fn test_mircat_rejects_bad_requests() {
    let server = standard_server().await;
    server.post("/api/mircat/connect", None).await;

    let (status, _) = server
        .post("/api/mircat/tune", Some(json!({ "wavelength": "far" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post("/api/mircat/scan", Some(json!({ "mode": "zigzag" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .post(
            "/api/mircat/scan",
            Some(json!({ "mode": "sweep", "start": 7.0, "stop": 7.0, "speed": 0.1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_mircat_requires_connection() {
    let server = standard_server().await;

    let (status, body) = server.post("/api/mircat/arm", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");

    let (_, body) = server.get("/api/mircat/status").await;
    assert_eq!(body["data"]["connected"], false);
}

#[tokio::test]
async fn test_mircat_rejects_overlapping_operations() {
    let server = standard_server().await;
    server.post("/api/mircat/connect", None).await;
    let (status, _) = server.post("/api/mircat/arm", None).await;
    assert_eq!(status, StatusCode::OK);

    let long_scan = server
        .client
        .post(server.url("/api/mircat/scan"))
        .json(&json!({
            "mode": "sweep",
            "start": 6.7,
            "stop": 7.2,
            "speed": 0.1,
            "num_scans": 1000
        }))
        .send();
    let scan = tokio::spawn(long_scan);

    let mut busy = false;
    for _ in 0..50 {
        let (_, body) = server.get("/api/mircat/status").await;
        if body["data"]["busy"] == true {
            busy = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(busy);

    let tune = json!({ "wavelength": 7.0, "units": "microns", "qcl": 1 });
    let (status, body) = server.post("/api/mircat/tune", Some(tune.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["status"], "error");

    let (_, body) = server.post("/api/mircat/cancel", None).await;
    assert_eq!(body["data"]["cancelled"], true);

    let response = scan.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = server.post("/api/mircat/tune", Some(tune)).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_unknown_api_path() {
    let server = standard_server().await;

    let (status, body) = server.get("/api/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "status": "error", "message": "Endpoint not found" })
    );
}

#[tokio::test]
async fn test_api_info_without_frontend() {
    let server = standard_server().await;

    let (status, body) = server.get("/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "info");
    assert_eq!(body["frontend"], "Not deployed");
    assert_eq!(body["modules"], json!(["arduino_uno_r4", "daylight_mircat"]));
    let endpoints = body["api_endpoints"].as_array().unwrap();
    assert!(endpoints.contains(&json!("/api/health")));
    assert!(endpoints.contains(&json!("/api/arduino")));
}

#[tokio::test]
async fn test_frontend_files_and_spa_routing() {
    let root = standard_root();
    let static_dir = root.path().join("static");
    std::fs::create_dir_all(static_dir.join("assets")).unwrap();
    std::fs::write(static_dir.join("index.html"), "<html>app</html>").unwrap();
    std::fs::write(static_dir.join("assets").join("app.js"), "console.log(1)").unwrap();
    let server = TestServer::start(root).await;

    let response = server
        .client
        .get(server.url("/assets/app.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "console.log(1)");

    let response = server
        .client
        .get(server.url("/experiment/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "<html>app</html>");
}
