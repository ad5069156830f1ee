//! Tests for the provider exchange log
//! Drives real enhance requests and inspects what lands on disk

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use idea_forge::config::{Config, ConfigOptions};
use idea_forge::enhancer::{AppContext, EnhanceServer};
use serde_json::{json, Value};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "AIzaSyTestOnlyKey000001234";

fn enable_exchange_log() {
    // Read once per process, so every test sets it before the first request
    std::env::set_var("IDEA_FORGE_HTTP_LOG", "1");
}

async fn start_server(provider_url: &str, log_dir: &Path) -> SocketAddr {
    let config = Config::new(
        API_KEY.to_string(),
        0,
        ConfigOptions {
            host: Some("127.0.0.1".to_string()),
            model: Some("gemini-test".to_string()),
            base_url: Some(provider_url.to_string()),
            timeout_secs: Some(5),
            http_log_dir: Some(log_dir.to_path_buf()),
        },
    )
    .unwrap();

    let context = Arc::new(AppContext::from_config(&config).unwrap());
    EnhanceServer::new(context)
        .start(config.socket_addr())
        .await
        .unwrap()
}

async fn post_enhance(addr: SocketAddr, input: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/enhance", addr))
        .json(&json!({ "input": input }))
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

fn log_file(log_dir: &Path) -> PathBuf {
    log_dir.join(".idea-forge").join("http_requests.log")
}

#[tokio::test]
async fn test_exchange_log_masks_key_and_holds_sanitized_idea() {
    enable_exchange_log();
    let log_dir = tempfile::tempdir().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/gemini-test:generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "bakery brief" }] } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let addr = start_server(&mock_server.uri(), log_dir.path()).await;
    let (status, body) = post_enhance(
        addr,
        "A <b>bakery</b><script>steal(document.cookie)</script> site",
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["enhanced"], "bakery brief");

    let log = std::fs::read_to_string(log_file(log_dir.path())).unwrap();
    assert!(log.contains("POST http://127.0.0.1"));
    assert!(log.contains("x-goog-api-key: AIza...1234"));
    assert!(!log.contains(API_KEY));
    assert!(log.contains("A bakery site"));
    assert!(!log.contains("steal"));
    assert!(!log.contains("<script"));
    assert!(log.contains("Status: 200"));
    assert!(log.contains("bakery brief"));
}

#[tokio::test]
async fn test_exchange_log_records_transport_failure() {
    enable_exchange_log();
    let log_dir = tempfile::tempdir().unwrap();

    // Nothing listens on port 1
    let addr = start_server("http://127.0.0.1:1", log_dir.path()).await;
    let (status, _) = post_enhance(addr, "A recipe blog").await;
    assert_eq!(status, 500);

    let log = std::fs::read_to_string(log_file(log_dir.path())).unwrap();
    assert!(log.contains("--- Error ("));
    assert!(!log.contains("--- Response ("));
    assert!(!log.contains(API_KEY));
}

#[tokio::test]
async fn test_exchange_log_appends_per_call() {
    enable_exchange_log();
    let log_dir = tempfile::tempdir().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/gemini-test:generateContent$"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "status": "RESOURCE_EXHAUSTED", "message": "quota" }
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let addr = start_server(&mock_server.uri(), log_dir.path()).await;
    post_enhance(addr, "first idea").await;
    post_enhance(addr, "second idea").await;

    let log = std::fs::read_to_string(log_file(log_dir.path())).unwrap();
    assert_eq!(log.matches("Status: 429").count(), 2);
    let first = log.find("first idea").unwrap();
    let second = log.find("second idea").unwrap();
    assert!(first < second);
}
