//! MCP Message Dispatcher
//!
//! Transport-agnostic handling of MCP messages. The stdio loop and the HTTP
//! endpoint both feed messages through [`McpState::handle_message`].

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::context::ToolContext;
use super::protocol::{
    methods, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse, PingResult,
    ResourcesCapability, ResourcesListResult, ResourcesReadParams, ResourcesReadResult,
    ResourcesTemplatesListResult, ServerCapabilities, ServerInfo, ToolsCallParams,
    ToolsCapability, ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use super::registry::McpRegistry;
use crate::auth::AuthResolver;
use crate::config::Transport;
use crate::gcp::CloudApi;
use crate::session::{SessionMetadata, SessionRegistry};
use crate::state::ProjectState;

pub const SERVER_NAME: &str = "gcp-mcp-server";

pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// Per-connection protocol state
#[derive(Debug, Clone, Default)]
pub struct McpConnection {
    pub session_id: Option<String>,
    pub initialized: bool,
}

impl McpConnection {
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            session_id,
            initialized: false,
        }
    }

    /// A connection whose session already completed `initialize`.
    pub fn initialized(session_id: String) -> Self {
        Self {
            session_id: Some(session_id),
            initialized: true,
        }
    }
}

/// State shared across MCP connections
pub struct McpState {
    pub registry: Arc<McpRegistry>,
    pub project_state: Arc<ProjectState>,
    pub auth: Arc<AuthResolver>,
    pub cloud: Arc<dyn CloudApi>,
    pub sessions: Arc<SessionRegistry>,
    pub transport: Transport,
    pub start_time: Instant,
}

impl McpState {
    /// Create the MCP state with registered tools and resources
    pub fn new(
        project_state: Arc<ProjectState>,
        auth: Arc<AuthResolver>,
        cloud: Arc<dyn CloudApi>,
        sessions: Arc<SessionRegistry>,
        transport: Transport,
    ) -> Self {
        let mut registry = McpRegistry::new();

        // Register all tools
        super::tools::register_all_tools(&mut registry);

        // Register all resources
        super::resources::register_all_resources(&mut registry);

        info!(
            "MCP registry initialized with {} tools and {} resources",
            registry.tool_count(),
            registry.resource_count()
        );

        Self {
            registry: Arc::new(registry),
            project_state,
            auth,
            cloud,
            sessions,
            transport,
            start_time: Instant::now(),
        }
    }

    fn tool_context(&self, connection: &McpConnection) -> ToolContext {
        ToolContext {
            project_state: self.project_state.clone(),
            auth: self.auth.clone(),
            cloud: self.cloud.clone(),
            sessions: self.sessions.clone(),
            session_id: connection.session_id.clone(),
            transport: self.transport,
            server_version: server_version(),
            start_time: self.start_time,
        }
    }

    /// Handle a single raw MCP message. Notifications produce no response.
    pub async fn handle_message(
        &self,
        text: &str,
        connection: &mut McpConnection,
    ) -> Option<McpResponse> {
        match parse_request(text) {
            Ok(request) => self.handle_request(request, connection).await,
            Err(error) => Some(McpResponse::error(None, error)),
        }
    }

    pub async fn handle_request(
        &self,
        request: McpRequest,
        connection: &mut McpConnection,
    ) -> Option<McpResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(McpResponse::error(
                request.id,
                McpError::InvalidRequest(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
            ));
        }

        let Some(request_id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        let gated = !matches!(request.method.as_str(), methods::INITIALIZE | methods::PING);
        let result = if gated && !connection.initialized {
            Err(McpError::NotInitialized)
        } else {
            match request.method.as_str() {
                methods::INITIALIZE => self.handle_initialize(&request, connection),
                methods::PING => handle_ping(),
                methods::TOOLS_LIST => self.handle_tools_list(),
                methods::TOOLS_CALL => self.handle_tools_call(&request, connection).await,
                methods::RESOURCES_LIST => self.handle_resources_list(),
                methods::RESOURCES_TEMPLATES_LIST => self.handle_resources_templates_list(),
                methods::RESOURCES_READ => self.handle_resources_read(&request, connection).await,
                methods::SHUTDOWN => {
                    debug!("Client requested shutdown");
                    Ok(json!({}))
                }
                other => Err(McpError::MethodNotFound(other.to_string())),
            }
        };

        Some(match result {
            Ok(value) => McpResponse::success(request_id, value),
            Err(error) => McpResponse::error(Some(request_id), error),
        })
    }

    fn handle_notification(&self, request: &McpRequest) {
        match request.method.as_str() {
            methods::INITIALIZED => debug!("Client finished initialization"),
            methods::CANCELLED => debug!("Client cancelled a request"),
            other => debug!("Ignoring notification: {}", other),
        }
    }

    fn handle_initialize(
        &self,
        request: &McpRequest,
        connection: &mut McpConnection,
    ) -> Result<Value, McpError> {
        let params: Option<InitializeParams> = request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        if let Some(params) = &params {
            if params.protocol_version != MCP_PROTOCOL_VERSION {
                debug!(
                    "Client requested protocol {}, answering with {}",
                    params.protocol_version, MCP_PROTOCOL_VERSION
                );
            }
        }

        if let Some(session_id) = &connection.session_id {
            let mut metadata = SessionMetadata::new();
            if let Some(client_info) = params.as_ref().and_then(|p| p.client_info.as_ref()) {
                metadata.insert("client_name".to_string(), json!(client_info.name));
                metadata.insert("client_version".to_string(), json!(client_info.version));
            }
            if let Some(params) = &params {
                metadata.insert(
                    "protocol_version".to_string(),
                    json!(params.protocol_version),
                );
            }
            metadata.insert("initialized".to_string(), json!(true));
            if !self.sessions.update_session_metadata(session_id, metadata) {
                warn!("Initialize on unknown session");
            }
        }

        connection.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: None }),
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: None,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: server_version(),
            },
            instructions: Some(
                "Google Cloud tools for Logging, Monitoring, Spanner, IAM and Trace. \
                 Tools default to the current project; use project.set to change it."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, McpError> {
        let result = ToolsListResult {
            tools: self.registry.list_tools(),
        };

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        request: &McpRequest,
        connection: &McpConnection,
    ) -> Result<Value, McpError> {
        let params: ToolsCallParams = parse_params(request)?;

        let tool = self
            .registry
            .get_tool(&params.name)
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

        debug!("MCP tool call: {}", params.name);
        let ctx = self.tool_context(connection);

        // Execute the tool
        let arguments = params.arguments.unwrap_or(json!({}));
        let result = (tool.handler)(ctx, arguments).await?;

        if result.is_error == Some(true) {
            warn!("Tool {} failed: {}", params.name, result.text_content());
        }

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    fn handle_resources_list(&self) -> Result<Value, McpError> {
        let result = ResourcesListResult {
            resources: self.registry.list_resources(),
        };

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    fn handle_resources_templates_list(&self) -> Result<Value, McpError> {
        let result = ResourcesTemplatesListResult {
            resource_templates: self.registry.list_resource_templates(),
        };

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_resources_read(
        &self,
        request: &McpRequest,
        connection: &McpConnection,
    ) -> Result<Value, McpError> {
        let params: ResourcesReadParams = parse_params(request)?;

        // Find matching resource
        let (resource, uri_params) = self
            .registry
            .find_resource(&params.uri)
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;

        debug!("MCP resource read: {}", params.uri);
        let ctx = self.tool_context(connection);

        // Read the resource
        let contents = (resource.handler)(ctx, params.uri, uri_params).await?;

        let result = ResourcesReadResult { contents };

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

/// Parses a raw message, distinguishing malformed JSON from malformed requests.
pub fn parse_request(text: &str) -> Result<McpRequest, McpError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| McpError::ParseError(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| McpError::InvalidRequest(e.to_string()))
}

fn parse_params<T: serde::de::DeserializeOwned>(request: &McpRequest) -> Result<T, McpError> {
    request
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))
}

fn handle_ping() -> Result<Value, McpError> {
    serde_json::to_value(PingResult {}).map_err(|e| McpError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSettings;
    use crate::gcp::{ApiEndpoints, RestCloudApi};

    fn test_state() -> McpState {
        let project_state = Arc::new(ProjectState::new(Some("test-project".to_string())));
        let client = reqwest::Client::new();
        let settings = AuthSettings {
            access_token: Some("token".to_string()),
            use_metadata_server: false,
            ..Default::default()
        };
        let auth = Arc::new(AuthResolver::new(settings, client.clone(), project_state.clone()));
        let cloud = Arc::new(RestCloudApi::new(
            client,
            auth.clone(),
            ApiEndpoints::all("http://127.0.0.1:9"),
        ));
        McpState::new(
            project_state,
            auth,
            cloud,
            Arc::new(SessionRegistry::default()),
            Transport::Stdio,
        )
    }

    async fn call(state: &McpState, conn: &mut McpConnection, message: Value) -> Option<Value> {
        state
            .handle_message(&message.to_string(), conn)
            .await
            .map(|r| serde_json::to_value(r).unwrap())
    }

    #[tokio::test]
    async fn test_parse_error() {
        let state = test_state();
        let mut conn = McpConnection::default();
        let response = state.handle_message("{not json", &mut conn).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let state = test_state();
        let mut conn = McpConnection::default();
        let response = call(&state, &mut conn, json!({"jsonrpc": "2.0", "id": 1}))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], -32600);

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "1.0", "id": 2, "method": "ping"}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_requests_before_initialize_are_rejected() {
        let state = test_state();
        let mut conn = McpConnection::default();

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], -32002);

        // ping is allowed
        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        )
        .await
        .unwrap();
        assert!(response["error"].is_null());
    }

    #[tokio::test]
    async fn test_initialize_then_list() {
        let state = test_state();
        let mut conn = McpConnection::default();

        let response = call(
            &state,
            &mut conn,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test", "version": "1.0"}
                }
            }),
        )
        .await
        .unwrap();
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], SERVER_NAME);
        assert!(conn.initialized);

        let notification = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
        assert!(notification.is_none());

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await
        .unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "logging.query"));
        assert!(tools.iter().any(|t| t["name"] == "project.set"));

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/templates/list"}),
        )
        .await
        .unwrap();
        let templates = response["result"]["resourceTemplates"].as_array().unwrap();
        assert!(templates
            .iter()
            .any(|t| t["uriTemplate"] == "iam://{project_id}/policy"));
    }

    #[tokio::test]
    async fn test_initialize_records_client_in_session() {
        let state = test_state();
        let session_id = state.sessions.create_session(SessionMetadata::new());
        let mut conn = McpConnection::new(Some(session_id.clone()));

        call(
            &state,
            &mut conn,
            json!({
                "jsonrpc": "2.0",
                "id": "init",
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "inspector", "version": "0.9"}
                }
            }),
        )
        .await
        .unwrap();

        let metadata = state.sessions.get_session_metadata(&session_id).unwrap();
        assert_eq!(metadata["client_name"], "inspector");
        assert_eq!(metadata["initialized"], true);
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let state = test_state();
        let mut conn = McpConnection::initialized("s".to_string());

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], -32601);

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "nope"}}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], -32601);

        let response = call(
            &state,
            &mut conn,
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read", "params": {"uri": "nope://x"}}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], -32004);
    }
}
