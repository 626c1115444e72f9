//! End-to-end tests for the HTTP session lifecycle
//!
//! Tests the initialize handshake, session header requirements, rotation
//! and explicit session teardown.

mod common;

use common::{TestClient, TestServer, TestServerOptions, CLIENT_NAME, TEST_PROJECT_ID};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_initialize_creates_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.initialize().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "gcp-mcp-server");

    let session_id = client.session_id().expect("No session id returned");
    assert!(server.sessions.validate_session(&session_id));

    let metadata = server.sessions.get_session_metadata(&session_id).unwrap();
    assert_eq!(metadata["transport"], "http");
    assert_eq!(metadata["client_name"], CLIENT_NAME);
    assert_eq!(metadata["initialized"], true);
}

#[tokio::test]
async fn test_each_initialize_opens_a_new_session() {
    let server = TestServer::spawn().await;
    let first = TestClient::initialized(server.base_url.clone()).await;
    let second = TestClient::initialized(server.base_url.clone()).await;

    assert_ne!(first.session_id(), second.session_id());
    assert_eq!(server.sessions.get_session_stats().active, 2);
}

#[tokio::test]
async fn test_request_without_session_header_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_message(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn test_request_with_unknown_session_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    client.set_session_id(Some("18f0000000a-doesnotexist".to_string()));

    let response = client
        .post_message(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_is_a_parse_error() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .client
        .post(format!("{}/mcp", server.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());
}

#[tokio::test]
async fn test_notifications_are_accepted() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    client.initialize().await;

    let response = client.notify("notifications/initialized").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;
    let session_id = client.session_id().unwrap();

    let response = client.delete_session().await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!server.sessions.validate_session(&session_id));

    // Gone for good
    let response = client.delete_session().await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post_message(json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_without_header_is_bad_request() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.delete_session().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_id_rotates_after_interval() {
    let server = TestServer::spawn_with(TestServerOptions {
        session_rotation_interval_sec: 1,
        ..Default::default()
    })
    .await;
    let client = TestClient::initialized(server.base_url.clone()).await;
    let original_id = client.session_id().unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let body = client.request("ping", None).await;
    assert!(body["error"].is_null());

    let rotated_id = client.session_id().unwrap();
    assert_ne!(rotated_id, original_id);
    assert!(!server.sessions.validate_session(&original_id));

    let record = server.sessions.get_session(&rotated_id).unwrap();
    assert_eq!(record.rotation_count, 1);
    // Metadata survives rotation, so the session stays initialized
    assert_eq!(record.metadata["client_name"], CLIENT_NAME);
    let body = client.request("tools/list", None).await;
    assert!(body["result"]["tools"].is_array());

    let stats = server.sessions.get_session_stats();
    assert_eq!(stats.rotated, 1);
    assert_eq!(stats.active, 1);
}

#[tokio::test]
async fn test_session_resource_reflects_connection() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let text = client.read_resource_text("session://current").await;
    let session: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(session["transport"], "http");
    assert_eq!(session["rotation_count"], 0);
    assert_eq!(session["metadata"]["client_name"], CLIENT_NAME);
    assert_eq!(session["registry"]["active"], 1);

    // The full id is never echoed back
    let session_id = client.session_id().unwrap();
    assert!(!text.contains(&session_id));
}

#[tokio::test]
async fn test_home_reports_server_stats() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let response = client.get_home().await;
    assert_eq!(response.status(), StatusCode::OK);

    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["transport"], "http");
    assert_eq!(stats["current_project_id"], TEST_PROJECT_ID);
    assert_eq!(stats["sessions"]["active"], 1);
    assert_eq!(stats["sessions"]["created"], 1);
    assert!(stats["uptime"].as_str().unwrap().starts_with("0d "));
}
