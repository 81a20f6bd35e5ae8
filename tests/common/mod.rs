//! Shared helpers for driving the router in-process

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{Request, Response};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wishfinity_mcp::{mcp_router, AppState, McpEngine, ServerConfig, SessionRegistry, ToolRegistry};

pub const WAIT: Duration = Duration::from_secs(5);

pub const EXPECTED_ACTION_URL: &str =
    "https://wishfinity.com/add?url=https%3A%2F%2Fexample.com%2Fitem%3Fa%3D1%26b%3D2&source=chatgpt";

pub fn app() -> (Router, AppState) {
    app_with_config(ServerConfig::default())
}

pub fn app_with_config(config: ServerConfig) -> (Router, AppState) {
    let engine = Arc::new(McpEngine::from_config(ToolRegistry::with_defaults(), &config));
    let state = AppState::new(engine, SessionRegistry::new(), config);
    (mcp_router(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router is infallible")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn save_link_call(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {
            "name": "get_wishfinity_save_link",
            "arguments": {"url": "https://example.com/item?a=1&b=2"}
        }
    })
}

/// One parsed server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental reader over an event-stream response body
pub struct SseReader {
    body: BodyDataStream,
    buffer: String,
}

impl SseReader {
    pub fn new(response: Response<Body>) -> Self {
        Self {
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next event carrying data, skipping keep-alive comments. `None` when
    /// the stream ends.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            while let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
            }

            let chunk = tokio::time::timeout(WAIT, self.body.next())
                .await
                .expect("event within timeout")?;
            let chunk = chunk.expect("body chunk");
            self.buffer.push_str(std::str::from_utf8(&chunk).expect("utf-8 chunk"));
        }
    }

    /// Next `message` event decoded as JSON
    pub async fn next_message(&mut self) -> Value {
        let event = self.next_event().await.expect("stream still open");
        assert_eq!(event.event, "message");
        serde_json::from_str(&event.data).expect("JSON-RPC payload")
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some((field, value)) = line.split_once(':') {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event = value.to_string(),
                "data" => data.push(value),
                _ => {}
            }
        }
    }
    if data.is_empty() {
        None
    } else {
        Some(SseEvent {
            event,
            data: data.join("\n"),
        })
    }
}

/// Open `GET /sse` and return the reader plus the advertised session id
pub async fn open_session(app: &Router) -> (SseReader, String) {
    let response = send(app, get("/sse")).await;
    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    let mut reader = SseReader::new(response);
    let endpoint = reader.next_event().await.expect("endpoint event");
    assert_eq!(endpoint.event, "endpoint");
    let session_id = endpoint
        .data
        .strip_prefix("/messages?sessionId=")
        .expect("endpoint path")
        .to_string();
    (reader, session_id)
}
