//! MCP HTTP server setup
//!
//! Route table. Each route states how it treats the request body:
//!
//! | route            | body                                         |
//! |------------------|----------------------------------------------|
//! | `GET /`          | none, liveness text                          |
//! | `GET /sse`       | none, opens an event stream                  |
//! | `POST /messages` | raw, read only after the session is resolved |
//! | `GET /mcp`       | none, readiness text                         |
//! | `POST /mcp`      | JSON-RPC payload, size capped                |
//! | `GET /debug`     | none, server info                            |

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, RawQuery, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;

use crate::config::ServerConfig;
use crate::mcp::engine::McpEngine;
use crate::session::{RegistryError, SessionRegistry};
use crate::transport::{ExchangeReply, SseTransport, StreamableTransport};

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";
pub const MCP_PATH: &str = "/mcp";
pub const DEBUG_PATH: &str = "/debug";

const ENDPOINTS: &[&str] = &["/", SSE_PATH, MESSAGES_PATH, MCP_PATH, DEBUG_PATH];

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub sse: SseTransport,
    pub streamable: StreamableTransport,
    pub engine: Arc<McpEngine>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(engine: Arc<McpEngine>, registry: SessionRegistry, config: ServerConfig) -> Self {
        let sse = SseTransport::new(registry, engine.clone(), MESSAGES_PATH)
            .with_buffer(config.session_buffer)
            .with_idle_timeout(config.idle_timeout);
        Self {
            sse,
            streamable: StreamableTransport::new(engine.clone()),
            engine,
            config: Arc::new(config),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        self.sse.registry()
    }
}

/// Middleware to log incoming HTTP requests.
///
/// Only the path is logged: the query string of `/messages` carries the
/// session capability.
async fn log_request_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(%method, %path, "HTTP request");

    let response = next.run(request).await;

    tracing::info!(%method, %path, status = %response.status(), "HTTP response");

    response
}

/// Fallback handler for unmatched routes
async fn fallback_handler(request: Request) -> impl IntoResponse {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::warn!(%method, %path, "No route found");

    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "received": {
                "method": method.as_str(),
                "path": path,
            },
            "available_endpoints": ENDPOINTS,
        })),
    )
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "Wishfinity MCP server is running.")
}

/// Debug endpoint that returns server info
async fn debug_handler(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Debug endpoint hit");

    let tools: Vec<&str> = state
        .engine
        .tools()
        .descriptors()
        .iter()
        .map(|d| d.name)
        .collect();

    Json(json!({
        "server": state.engine.server_name(),
        "version": state.engine.server_version(),
        "sse_endpoint": SSE_PATH,
        "messages_endpoint": MESSAGES_PATH,
        "mcp_endpoint": MCP_PATH,
        "active_sessions": state.sessions().len(),
        "tools": tools,
    }))
}

async fn sse_handler(State(state): State<AppState>) -> Response {
    let stream = match state.sse.open_stream() {
        Ok(stream) => stream,
        Err(RegistryError::ShuttingDown) => {
            tracing::debug!("Refusing stream during shutdown");
            return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
        }
        Err(e) => {
            tracing::error!("Failed to open session: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to open session").into_response();
        }
    };

    let events = stream
        .map(|frame| Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data)));

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(state.config.keep_alive))
        .into_response()
}

async fn messages_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Body,
) -> Response {
    let session_id = query.as_deref().and_then(session_id_from_query);

    let session = match state.sse.resolve(session_id.as_deref()) {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!("Rejected message post: {}", e);
            return e.into_response();
        }
    };

    let body = match axum::body::to_bytes(body, state.config.message_body_limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(session_id = %session.id(), "Failed to read message body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Message body too large").into_response();
        }
    };

    match state.sse.deliver(&session, &body) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(e) => e.into_response(),
    }
}

async fn mcp_ready_handler() -> impl IntoResponse {
    (StatusCode::OK, "MCP endpoint ready.")
}

async fn mcp_exchange_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.streamable.handle_exchange(&body).await {
        ExchangeReply::Message(reply) => (StatusCode::OK, Json(reply)).into_response(),
        ExchangeReply::Accepted => StatusCode::ACCEPTED.into_response(),
    }
}

/// The `sessionId` value of a raw query string. A repeated key is not a
/// single id and counts as missing.
fn session_id_from_query(query: &str) -> Option<String> {
    let mut values = form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "sessionId")
        .map(|(_, value)| value.into_owned());
    let first = values.next()?;
    match values.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Build the router for all MCP routes
pub fn mcp_router(state: AppState) -> Router {
    let exchange_limit = state.config.exchange_body_limit;

    Router::new()
        .route("/", get(health_handler))
        .route(SSE_PATH, get(sse_handler))
        .route(MESSAGES_PATH, axum::routing::post(messages_handler))
        .route(
            MCP_PATH,
            get(mcp_ready_handler)
                .post(mcp_exchange_handler)
                .layer(DefaultBodyLimit::max(exchange_limit)),
        )
        .route(DEBUG_PATH, get(debug_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn(log_request_middleware))
        .with_state(state)
}

/// Serve the MCP routes on `listener` until `shutdown` resolves.
///
/// On shutdown every open session is closed first so that long-lived
/// streams do not hold graceful shutdown open.
pub async fn serve_mcp_http<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sse = state.sse.clone();
    let app = mcp_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            sse.shutdown();
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_id_in_query() {
        assert_eq!(session_id_from_query("sessionId=abc"), Some("abc".to_string()));
        assert_eq!(
            session_id_from_query("x=1&sessionId=a%2Db"),
            Some("a-b".to_string())
        );
        assert_eq!(session_id_from_query("sessionId=abc&sessionId=other"), None);
        assert_eq!(session_id_from_query("sessionId=abc&sessionId=abc"), None);
        assert_eq!(session_id_from_query("session=abc"), None);
        assert_eq!(session_id_from_query(""), None);
    }
}
