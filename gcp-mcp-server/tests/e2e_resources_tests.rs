//! End-to-end tests for MCP resources
//!
//! Tests resource listing, URI template matching and the cloud-backed
//! resources against the fake cloud.

mod common;

use common::{
    TestClient, TestServer, FAKE_DATABASE, FAKE_INSTANCE, FAKE_LOG_MESSAGE, FAKE_MEMBER,
    FAKE_TRACE_ID, OTHER_PROJECT_ID, TEST_PROJECT_ID,
};
use serde_json::Value;

#[tokio::test]
async fn test_resources_list_has_fixed_uris_only() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let body = client.request("resources/list", None).await;
    let uris: Vec<&str> = body["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();

    assert!(uris.contains(&"gcp://project/current"));
    assert!(uris.contains(&"session://current"));
    assert!(uris.iter().all(|u| !u.contains('{')));
}

#[tokio::test]
async fn test_resource_templates_list() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let body = client.request("resources/templates/list", None).await;
    let templates: Vec<&str> = body["result"]["resourceTemplates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uriTemplate"].as_str().unwrap())
        .collect();

    for expected in [
        "logging://{project_id}/recent",
        "iam://{project_id}/policy",
        "spanner://{project_id}/{instance}/{database}/schema",
        "trace://{project_id}/{trace_id}",
    ] {
        assert!(templates.contains(&expected), "missing template {}", expected);
    }
}

#[tokio::test]
async fn test_current_project_resource() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let body = client.read_resource("gcp://project/current").await;
    let content = &body["result"]["contents"][0];
    assert_eq!(content["mimeType"], "application/json");

    let project: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
    assert_eq!(project["current_project_id"], TEST_PROJECT_ID);
    assert_eq!(project["transport"], "http");
    assert!(project["server_version"].as_str().is_some());
}

#[tokio::test]
async fn test_recent_logs_resource() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let uri = format!("logging://{}/recent", OTHER_PROJECT_ID);
    let body = client.read_resource(&uri).await;
    let content = &body["result"]["contents"][0];

    assert_eq!(content["uri"], uri.as_str());
    assert_eq!(content["mimeType"], "text/markdown");
    assert!(content["text"].as_str().unwrap().contains(FAKE_LOG_MESSAGE));
    assert_eq!(server.cloud.last_project().as_deref(), Some(OTHER_PROJECT_ID));
}

#[tokio::test]
async fn test_iam_policy_resource() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let text = client
        .read_resource_text(&format!("iam://{}/policy", TEST_PROJECT_ID))
        .await;
    let policy: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(policy["version"], 3);
    assert_eq!(policy["bindings"][0]["role"], "roles/viewer");
    assert_eq!(policy["bindings"][0]["members"][0], FAKE_MEMBER);
}

#[tokio::test]
async fn test_spanner_schema_resource() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let text = client
        .read_resource_text(&format!(
            "spanner://{}/{}/{}/schema",
            TEST_PROJECT_ID, FAKE_INSTANCE, FAKE_DATABASE
        ))
        .await;

    assert!(text.contains("### Orders"));
    assert!(text.contains("| OrderId | STRING(36) | NO |"));
    assert!(text.contains("2 tables"));
}

#[tokio::test]
async fn test_trace_resource() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let text = client
        .read_resource_text(&format!("trace://{}/{}", TEST_PROJECT_ID, FAKE_TRACE_ID))
        .await;

    assert!(text.contains(&format!("## Trace `{}`", FAKE_TRACE_ID)));
    assert!(text.contains("Spans: 2"));
}

#[tokio::test]
async fn test_missing_cloud_object_is_resource_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let body = client
        .read_resource(&format!("trace://{}/ffff", TEST_PROJECT_ID))
        .await;
    assert_eq!(body["error"]["code"], -32004);

    let body = client
        .read_resource(&format!(
            "spanner://{}/{}/missing-db/schema",
            TEST_PROJECT_ID, FAKE_INSTANCE
        ))
        .await;
    assert_eq!(body["error"]["code"], -32004);
}

#[tokio::test]
async fn test_unknown_resource() {
    let server = TestServer::spawn().await;
    let client = TestClient::initialized(server.base_url.clone()).await;

    let body = client.read_resource("ftp://example.com/file").await;
    assert_eq!(body["error"]["code"], -32004);

    // Template segments never span a slash
    let body = client.read_resource("iam://a/b/policy").await;
    assert_eq!(body["error"]["code"], -32004);
}
