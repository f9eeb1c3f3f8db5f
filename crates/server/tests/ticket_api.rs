//! End-to-end API tests against the real binary.
//!
//! The classifier URL points at a closed port, so triage attempts fail and
//! exercise the retry/fencing path; the happy classification path is covered
//! by the core crate's lifecycle tests.

use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Build a config with a short retry backoff and an unreachable classifier
fn test_config(port: u16, db_path: &str) -> String {
    format!(
        r#"
[classifier]
url = "http://127.0.0.1:1"
timeout_secs = 1

[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[triage]
workers = 2
retry_base_delay_ms = 50
"#,
        port, db_path
    )
}

/// Spawn the server binary and return a handle
fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_triaged"))
        .env("TRIAGE_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for the server to answer health checks
async fn wait_for_server(client: &Client, port: u16) {
    let url = format!("http://127.0.0.1:{}/api/v1/health", port);
    for _ in 0..100 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server never became healthy on port {}", port);
}

struct TestServer {
    port: u16,
    client: Client,
    _child: tokio::process::Child,
    _temp_dir: TempDir,
    _config_file: tempfile::NamedTempFile,
}

impl TestServer {
    async fn start() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("triage.db");
        let port = get_available_port();

        let mut config_file = tempfile::NamedTempFile::new().unwrap();
        write!(config_file, "{}", test_config(port, db_path.to_str().unwrap())).unwrap();

        let child = spawn_server(config_file.path());
        let client = Client::new();
        wait_for_server(&client, port).await;

        Self {
            port,
            client,
            _child: child,
            _temp_dir: temp_dir,
            _config_file: config_file,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_json(&self, path: &str, body: Value) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

#[tokio::test]
async fn ticket_lifecycle_with_unreachable_classifier() {
    let server = TestServer::start().await;

    // Create a ticket.
    let (status, created) = server
        .post_json(
            "/api/v1/tickets",
            json!({
                "title": "Cannot log in to my account",
                "description": "Every login attempt fails with error 500.",
                "category": "tech",
                "created_by": "user-1",
            }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(created["status"], "open");
    let ticket_id = created["id"].as_str().unwrap().to_string();
    let trace_id = created["trace_id"].as_str().unwrap().to_string();

    // Fetch it back.
    let (status, fetched) = server
        .get_json(&format!("/api/v1/tickets/{}", ticket_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(fetched["title"], "Cannot log in to my account");

    // With the classifier unreachable, the retry budget (3 attempts, 50 ms
    // base backoff) drains and the ticket is fenced to waiting_human.
    let mut fenced = false;
    for _ in 0..100 {
        let (_, ticket) = server
            .get_json(&format!("/api/v1/tickets/{}", ticket_id))
            .await;
        if ticket["status"] == "waiting_human" {
            fenced = true;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(fenced, "ticket was never fenced to waiting_human");

    // The audit trail explains why, in causal order.
    let (status, audit) = server
        .get_json(&format!("/api/v1/audit?trace_id={}", trace_id))
        .await;
    assert_eq!(status, 200);
    let actions: Vec<String> = audit["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap().to_string())
        .collect();
    assert!(actions.contains(&"ticket_created".to_string()));
    assert!(actions.contains(&"triage_failed".to_string()));
    assert_eq!(
        actions.iter().filter(|a| *a == "triage_failed").count(),
        1
    );
    let created_pos = actions.iter().position(|a| a == "ticket_created").unwrap();
    let failed_pos = actions.iter().position(|a| a == "triage_failed").unwrap();
    assert!(created_pos < failed_pos);

    // A human reply resolves the fenced ticket.
    let (status, replied) = server
        .post_json(
            &format!("/api/v1/tickets/{}/replies", ticket_id),
            json!({
                "author": "agent-9",
                "content": "Reset your password from the account page.",
                "change_status": "resolved",
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(replied["status"], "resolved");

    // Re-triage of a resolved ticket is rejected.
    let (status, _) = server
        .post_json(&format!("/api/v1/tickets/{}/retriage", ticket_id), json!({}))
        .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn policy_roundtrip_and_validation() {
    let server = TestServer::start().await;

    // Lazily created with defaults.
    let (status, policy) = server.get_json("/api/v1/policy").await;
    assert_eq!(status, 200);
    assert_eq!(policy["auto_close_enabled"], true);
    assert_eq!(policy["max_retries"], 3);

    // Partial update.
    let resp = server
        .client
        .put(server.url("/api/v1/policy"))
        .json(&json!({
            "auto_close_enabled": false,
            "confidence_threshold": 0.9,
            "updated_by": "admin-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["auto_close_enabled"], false);

    // Out-of-range threshold is rejected.
    let resp = server
        .client
        .put(server.url("/api/v1/policy"))
        .json(&json!({ "confidence_threshold": 1.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // The change is durable.
    let (_, policy) = server.get_json("/api/v1/policy").await;
    assert_eq!(policy["auto_close_enabled"], false);

    // The operator change landed in the audit trail.
    let (_, audit) = server.get_json("/api/v1/audit?action=policy_updated").await;
    assert_eq!(audit["total"], 1);
}

#[tokio::test]
async fn validation_rejects_bad_ticket_bodies() {
    let server = TestServer::start().await;

    let (status, _) = server
        .post_json(
            "/api/v1/tickets",
            json!({
                "title": "hi",
                "description": "This description is long enough.",
                "created_by": "user-1",
            }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = server
        .post_json(
            "/api/v1/tickets",
            json!({
                "title": "A valid ticket title",
                "description": "too short",
                "created_by": "user-1",
            }),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let server = TestServer::start().await;

    let resp = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
