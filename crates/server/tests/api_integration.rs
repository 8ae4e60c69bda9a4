use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::sleep;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a config with database path.
///
/// The provider URL points at a closed port; none of these tests reach
/// the upstream because the database starts empty.
fn base_config(port: u16, db_path: &str) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[provider]
base_url = "http://127.0.0.1:9"
username = "agency"
password = "hunter2"
"#,
        port, db_path
    )
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_faretrack"))
        .env("FARETRACK_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

struct TestServer {
    port: u16,
    client: Client,
    child: tokio::process::Child,
    _temp_dir: TempDir,
    _config_file: NamedTempFile,
}

impl TestServer {
    async fn start(extra_config: &str) -> Self {
        let port = get_available_port();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let mut config_content = base_config(port, db_path.to_str().unwrap());
        config_content.push_str(extra_config);

        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(config_content.as_bytes()).unwrap();
        config_file.flush().unwrap();

        let child = spawn_server(config_file.path()).await;
        assert!(
            wait_for_server(port, 40).await,
            "Server did not start in time"
        );

        Self {
            port,
            client: Client::new(),
            child,
            _temp_dir: temp_dir,
            _config_file: config_file,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    async fn stop(mut self) {
        self.child.kill().await.ok();
    }
}

#[tokio::test]
async fn test_health_and_database_creation() {
    let port = get_available_port();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let config_content = base_config(port, db_path.to_str().unwrap());
    let mut config_file = NamedTempFile::new().unwrap();
    config_file.write_all(config_content.as_bytes()).unwrap();
    config_file.flush().unwrap();

    let mut server = spawn_server(config_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    assert!(
        db_path.exists(),
        "Database file should be created on startup"
    );

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_redacts_secrets() {
    let server = TestServer::start("\n[cron]\nsecret = \"s3cret-token\"\n").await;

    let response = server
        .client
        .get(server.url("/api/v1/config"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let text = response.text().await.unwrap();
    assert!(!text.contains("hunter2"), "password must not leak");
    assert!(!text.contains("s3cret-token"), "cron secret must not leak");

    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["provider"]["password_configured"], true);
    assert_eq!(body["cron"]["secret_configured"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_cron_without_configured_secret_returns_500() {
    let server = TestServer::start("").await;

    let response = server
        .client
        .post(server.url("/api/v1/cron/refresh-packages"))
        .header("Authorization", "Bearer anything")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    server.stop().await;
}

#[tokio::test]
async fn test_cron_with_wrong_secret_returns_401() {
    let server = TestServer::start("\n[cron]\nsecret = \"right-secret\"\n").await;

    let response = server
        .client
        .post(server.url("/api/v1/cron/refresh-packages"))
        .header("Authorization", "Bearer wrong-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Missing header is rejected the same way
    let response = server
        .client
        .post(server.url("/api/v1/cron/refresh-packages"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    server.stop().await;
}

#[tokio::test]
async fn test_cron_with_correct_secret_runs_empty_batch() {
    let server = TestServer::start("\n[cron]\nsecret = \"right-secret\"\n").await;

    // GET works too, some schedulers cannot POST
    let response = server
        .client
        .get(server.url("/api/v1/cron/refresh-packages"))
        .header("Authorization", "Bearer right-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["processed"], 0);
    assert_eq!(body["successCount"], 0);
    assert_eq!(body["priceChanges"], 0);

    server.stop().await;
}

#[tokio::test]
async fn test_requote_status_empty() {
    let server = TestServer::start("").await;

    let response = server
        .client
        .get(server.url("/api/v1/requote/run"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["pendingCount"], 0);
    assert_eq!(body["packages"].as_array().unwrap().len(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_manual_quote_check_without_webhook_returns_503() {
    let server = TestServer::start("").await;

    let response = server
        .client
        .post(server.url("/api/v1/notifications/check-manual-quotes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);

    // The read-only status endpoint works without a channel
    let response = server
        .client
        .get(server.url("/api/v1/notifications/check-manual-quotes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["pendingCount"], 0);

    server.stop().await;
}

#[tokio::test]
async fn test_audit_endpoint_returns_service_started_event() {
    let server = TestServer::start("").await;

    // Give the audit writer a moment to write the event
    sleep(Duration::from_millis(200)).await;

    let response = server
        .client
        .get(server.url("/api/v1/audit?event_type=service_started"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["total"].as_i64().unwrap() >= 1);
    let events = body["events"].as_array().unwrap();
    assert!(!events.is_empty());
    assert_eq!(events[0]["event_type"], "service_started");

    server.stop().await;
}

#[tokio::test]
async fn test_metrics_endpoint_exports_request_counters() {
    let server = TestServer::start("").await;

    // One request so the HTTP counters have a sample
    server
        .client
        .get(server.url("/api/v1/health"))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let text = response.text().await.unwrap();
    assert!(text.contains("faretrack_http_requests_total"));
    assert!(text.contains("# HELP"));

    server.stop().await;
}
