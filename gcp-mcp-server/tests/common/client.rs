//! HTTP client for end-to-end tests
//!
//! This module provides a high-level MCP client that wraps reqwest,
//! tracks the `Mcp-Session-Id` header and builds JSON-RPC envelopes.
//!
//! When the transport or message formats change, update only this file.

use super::constants::*;
use gcp_mcp_server::server::HEADER_SESSION_ID;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// MCP test client with header-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    session_id: Mutex<Option<String>>,
    next_id: AtomicI64,
}

impl TestClient {
    /// Creates a client without a session
    ///
    /// Use this for testing the session handshake.
    /// For most tests, use `initialized()` instead.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            session_id: Mutex::new(None),
            next_id: AtomicI64::new(1),
        }
    }

    /// Creates a client that completed `initialize` and sent
    /// `notifications/initialized`
    ///
    /// # Panics
    ///
    /// Panics if the handshake fails (indicates test infrastructure problem).
    pub async fn initialized(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.initialize().await;
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Initialize failed: {:?}",
            response.text().await
        );

        let response = client.notify("notifications/initialized").await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        client
    }

    /// Current session id, as last returned by the server
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }

    /// Overrides the session id sent with the next requests
    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.lock().unwrap() = session_id;
    }

    fn next_request_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// POST a raw JSON-RPC message to /mcp, remembering any session id returned
    pub async fn post_message(&self, message: Value) -> Response {
        let mut request = self
            .client
            .post(format!("{}/mcp", self.base_url))
            .json(&message);
        if let Some(session_id) = self.session_id() {
            request = request.header(HEADER_SESSION_ID, session_id);
        }
        let response = request.send().await.expect("POST /mcp failed");

        if let Some(value) = response.headers().get(HEADER_SESSION_ID) {
            let session_id = value.to_str().expect("Session header is not ASCII");
            self.set_session_id(Some(session_id.to_string()));
        }
        response
    }

    /// DELETE /mcp for the current session
    pub async fn delete_session(&self) -> Response {
        let mut request = self.client.delete(format!("{}/mcp", self.base_url));
        if let Some(session_id) = self.session_id() {
            request = request.header(HEADER_SESSION_ID, session_id);
        }
        request.send().await.expect("DELETE /mcp failed")
    }

    /// GET / server stats
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("GET / failed")
    }

    // ========================================================================
    // JSON-RPC
    // ========================================================================

    pub async fn initialize(&self) -> Response {
        let id = self.next_request_id();
        self.post_message(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": CLIENT_NAME, "version": CLIENT_VERSION}
            }
        }))
        .await
    }

    pub async fn notify(&self, method: &str) -> Response {
        self.post_message(json!({"jsonrpc": "2.0", "method": method}))
            .await
    }

    /// Sends a request and returns the whole JSON-RPC response body
    ///
    /// # Panics
    ///
    /// Panics if the HTTP status is not 200.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Value {
        let id = self.next_request_id();
        let mut message = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if let Some(params) = params {
            message["params"] = params;
        }

        let response = self.post_message(message).await;
        assert_eq!(response.status(), StatusCode::OK, "{} failed", method);
        let body: Value = response.json().await.expect("Response is not JSON");
        assert_eq!(body["id"], id);
        body
    }

    /// Calls a tool and returns the JSON-RPC response body
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        self.request(
            "tools/call",
            Some(json!({"name": name, "arguments": arguments})),
        )
        .await
    }

    /// Calls a tool expecting a result, returning `(text, is_error)`
    pub async fn call_tool_text(&self, name: &str, arguments: Value) -> (String, bool) {
        let body = self.call_tool(name, arguments).await;
        let result = &body["result"];
        assert!(result.is_object(), "{} returned no result: {}", name, body);
        let text = result["content"][0]["text"]
            .as_str()
            .expect("Tool result has no text content")
            .to_string();
        (text, result["isError"] == true)
    }

    /// Reads a resource and returns the JSON-RPC response body
    pub async fn read_resource(&self, uri: &str) -> Value {
        self.request("resources/read", Some(json!({"uri": uri})))
            .await
    }

    /// Reads a resource expecting contents, returning the first text
    pub async fn read_resource_text(&self, uri: &str) -> String {
        let body = self.read_resource(uri).await;
        body["result"]["contents"][0]["text"]
            .as_str()
            .unwrap_or_else(|| panic!("{} returned no contents: {}", uri, body))
            .to_string()
    }
}
