//! Tool registry
//!
//! Tools are registered once at startup and looked up by name on every
//! `tools/call`. Each registered tool pairs a descriptor (name, description,
//! derived input schema) with a type-erased handler that decodes and
//! validates its arguments before the typed handler runs.

pub mod wishfinity;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProtocolError;

pub use wishfinity::{SaveLinkInput, WishfinitySaveLink};

/// Arguments accepted by a tool.
///
/// Decoding enforces the shape described by the derived schema; `validate`
/// adds the constraints a schema cannot express.
pub trait ToolInput: DeserializeOwned + JsonSchema + Send + 'static {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A callable exposed to clients through `tools/call`
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    type Input: ToolInput;

    fn name(&self) -> &'static str;

    /// Tells the calling agent when the tool applies
    fn description(&self) -> &'static str;

    async fn call(&self, input: Self::Input) -> anyhow::Result<CallToolResult>;
}

type ErasedHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<CallToolResult, ProtocolError>> + Send + Sync>;

/// A registered tool
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Arc<JsonObject>,
    handler: ErasedHandler,
}

impl ToolDescriptor {
    /// The MCP `Tool` shape advertised by `tools/list`
    pub fn to_tool(&self) -> Tool {
        Tool::new(self.name, self.description, self.input_schema.clone())
    }

    /// Decode, validate and run the handler.
    ///
    /// Decode and validation failures surface as `InvalidParams` and never
    /// reach the handler. Handler errors and panics surface as
    /// `ToolExecution`.
    pub async fn invoke(&self, arguments: Value) -> Result<CallToolResult, ProtocolError> {
        (self.handler)(arguments).await
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled tools
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(WishfinitySaveLink);
        registry
    }

    /// Register a handler. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<H: ToolHandler>(&mut self, handler: H) -> &mut Self {
        let name = handler.name();
        let description = handler.description();
        let input_schema = Arc::new(input_schema_for::<H::Input>());

        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |arguments: Value| {
            let handler = handler.clone();
            async move {
                let input: H::Input = serde_json::from_value(arguments)
                    .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?;
                input.validate().map_err(ProtocolError::InvalidParams)?;

                match AssertUnwindSafe(handler.call(input)).catch_unwind().await {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => {
                        tracing::warn!(tool = name, "Tool handler failed: {:#}", e);
                        Err(ProtocolError::ToolExecution(e.to_string()))
                    }
                    Err(_) => {
                        tracing::error!(tool = name, "Tool handler panicked");
                        Err(ProtocolError::ToolExecution("tool handler panicked".to_string()))
                    }
                }
            }
            .boxed()
        });

        self.tools.insert(
            name,
            ToolDescriptor {
                name,
                description,
                input_schema,
                handler: erased,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Descriptors sorted by name, for stable `tools/list` output
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut descriptors: Vec<_> = self.tools.values().collect();
        descriptors.sort_by_key(|d| d.name);
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve `name` and invoke it with `arguments`
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<CallToolResult, ProtocolError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| ProtocolError::ToolNotFound(name.to_string()))?;
        descriptor.invoke(arguments).await
    }
}

fn input_schema_for<T: JsonSchema>() -> JsonObject {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(&schema) {
        Ok(Value::Object(mut object)) => {
            object.remove("$schema");
            object
        }
        _ => {
            let mut object = JsonObject::new();
            object.insert("type".to_string(), Value::String("object".to_string()));
            object
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::Content;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoInput {
        text: String,
    }

    impl ToolInput for EchoInput {
        fn validate(&self) -> Result<(), String> {
            if self.text.is_empty() {
                return Err("text must not be empty".to_string());
            }
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        type Input = EchoInput;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo text back"
        }

        async fn call(&self, input: EchoInput) -> anyhow::Result<CallToolResult> {
            match input.text.as_str() {
                "fail" => anyhow::bail!("asked to fail"),
                "panic" => panic!("asked to panic"),
                _ => Ok(CallToolResult::success(vec![Content::text(input.text)])),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        registry
    }

    #[tokio::test]
    async fn invokes_registered_tool() {
        let result = registry().invoke("echo", json!({"text": "hi"})).await.unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let err = registry().invoke("nope", json!({})).await.unwrap_err();
        assert_eq!(err, ProtocolError::ToolNotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_params() {
        let registry = registry();
        let err = registry.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams(_)));

        let err = registry.invoke("echo", json!({"text": ""})).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidParams("text must not be empty".to_string())
        );
    }

    #[tokio::test]
    async fn handler_errors_and_panics_become_execution_errors() {
        let registry = registry();
        let err = registry.invoke("echo", json!({"text": "fail"})).await.unwrap_err();
        assert_eq!(err, ProtocolError::ToolExecution("asked to fail".to_string()));

        let err = registry.invoke("echo", json!({"text": "panic"})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ToolExecution(_)));
    }

    #[test]
    fn schema_is_derived_from_input_type() {
        let registry = registry();
        let descriptor = registry.get("echo").unwrap();
        assert_eq!(descriptor.input_schema["type"], "object");
        assert!(descriptor.input_schema["properties"]["text"].is_object());
        assert!(!descriptor.input_schema.contains_key("$schema"));
    }
}
