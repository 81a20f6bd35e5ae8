//! MCP protocol engine
//!
//! Transport-independent: takes one decoded message, returns the reply (if
//! the message warrants one). Every failure becomes a JSON-RPC error reply;
//! nothing here produces a transport-level error.

use rmcp::model::ServerCapabilities;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ServerConfig;
use crate::error::ProtocolError;
use crate::mcp::message::{JsonRpcMessage, Notification, Request};
use crate::tools::ToolRegistry;

/// Protocol revisions this server speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    protocol_version: Option<String>,
    #[serde(default)]
    client_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug)]
pub struct McpEngine {
    tools: ToolRegistry,
    server_name: String,
    server_version: String,
}

impl McpEngine {
    pub fn new(
        tools: ToolRegistry,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            server_name: server_name.into(),
            server_version: server_version.into(),
        }
    }

    pub fn from_config(tools: ToolRegistry, config: &ServerConfig) -> Self {
        Self::new(tools, config.server_name.clone(), config.server_version.clone())
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Handle one message. Requests always produce a reply; notifications
    /// and client-sent responses never do.
    pub async fn handle(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
            JsonRpcMessage::Response(response) => {
                tracing::debug!(id = %response.id, "Ignoring client response");
                None
            }
            JsonRpcMessage::Error(error) => {
                tracing::warn!(
                    code = error.error.code,
                    "Client reported error: {}",
                    error.error.message
                );
                None
            }
        }
    }

    async fn handle_request(&self, request: Request) -> JsonRpcMessage {
        tracing::debug!(id = %request.id, method = %request.method, "Dispatching request");
        match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcMessage::response(request.id, result),
            Err(e) => {
                tracing::debug!(id = %request.id, "Request failed: {}", e);
                JsonRpcMessage::error(Some(request.id), &e)
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, ProtocolError> {
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(params).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_notification(&self, notification: Notification) {
        match notification.method.as_str() {
            "notifications/initialized" => tracing::info!("Client initialized"),
            "notifications/cancelled" => {
                tracing::debug!(params = ?notification.params, "Client cancelled a request")
            }
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params: InitializeParams = decode_params(params)?.unwrap_or_default();

        let version = params
            .protocol_version
            .as_deref()
            .filter(|requested| SUPPORTED_PROTOCOL_VERSIONS.contains(requested))
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

        tracing::info!(
            requested = ?params.protocol_version,
            negotiated = version,
            client = ?params.client_info,
            "Initializing MCP session"
        );

        let capabilities = ServerCapabilities::builder().enable_tools().build();

        Ok(json!({
            "protocolVersion": version,
            "capabilities": capabilities,
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version,
            }
        }))
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<_> = self
            .tools
            .descriptors()
            .into_iter()
            .map(|d| d.to_tool())
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params: CallToolParams = decode_params(params)?
            .ok_or_else(|| ProtocolError::InvalidParams("missing params".to_string()))?;
        let arguments = match params.arguments {
            Some(Value::Null) | None => json!({}),
            Some(arguments) => arguments,
        };

        tracing::info!(tool = %params.name, "Calling tool");
        let result = self.tools.invoke(&params.name, arguments).await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::ToolExecution(e.to_string()))
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> Result<Option<T>, ProtocolError> {
    match params {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ProtocolError::InvalidParams(e.to_string())),
    }
}
