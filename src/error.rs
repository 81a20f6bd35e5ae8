//! Error types for the transport and protocol layers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jsonrpsee::types::ErrorCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Addressing failures on the message side of the event-stream transport.
///
/// These never reach the protocol engine and are answered with an HTTP
/// status code.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Missing sessionId")]
    MissingSessionId,

    #[error("Unknown sessionId")]
    UnknownSession(String),

    /// The session was found but its stream closed before the message could
    /// be queued.
    #[error("Session closed")]
    SessionClosed(String),

    /// The session's inbox is full because its stream is not being read.
    /// The post is refused rather than parked.
    #[error("Session busy")]
    SessionBusy(String),
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportError::MissingSessionId => StatusCode::BAD_REQUEST,
            TransportError::UnknownSession(_) | TransportError::SessionClosed(_) => {
                StatusCode::NOT_FOUND
            }
            TransportError::SessionBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Protocol-level failures, always delivered as JSON-RPC error objects.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),
}

impl ProtocolError {
    pub fn code(&self) -> i32 {
        let code = match self {
            ProtocolError::Parse(_) => ErrorCode::ParseError,
            ProtocolError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ProtocolError::MethodNotFound(_) => ErrorCode::MethodNotFound,
            ProtocolError::ToolNotFound(_) | ProtocolError::InvalidParams(_) => {
                ErrorCode::InvalidParams
            }
            ProtocolError::ToolExecution(_) => ErrorCode::InternalError,
        };
        code.code()
    }

    /// Short name of the failure class, carried in the error object's `data`
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Parse(_) => "ParseError",
            ProtocolError::InvalidRequest(_) => "InvalidRequest",
            ProtocolError::MethodNotFound(_) => "MethodNotFound",
            ProtocolError::ToolNotFound(_) => "ToolNotFound",
            ProtocolError::InvalidParams(_) => "InvalidParams",
            ProtocolError::ToolExecution(_) => "ToolExecutionError",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ProtocolError::Parse(d)
            | ProtocolError::InvalidRequest(d)
            | ProtocolError::MethodNotFound(d)
            | ProtocolError::ToolNotFound(d)
            | ProtocolError::InvalidParams(d)
            | ProtocolError::ToolExecution(d) => d,
        }
    }

    pub fn data(&self) -> Value {
        json!({ "kind": self.kind(), "detail": self.detail() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_codes_follow_json_rpc() {
        assert_eq!(ProtocolError::Parse("x".into()).code(), -32700);
        assert_eq!(ProtocolError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(ProtocolError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(ProtocolError::ToolNotFound("x".into()).code(), -32602);
        assert_eq!(ProtocolError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(ProtocolError::ToolExecution("x".into()).code(), -32603);
    }

    #[test]
    fn transport_errors_map_to_status_codes() {
        assert_eq!(TransportError::MissingSessionId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            TransportError::UnknownSession("s".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TransportError::SessionClosed("s".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TransportError::SessionBusy("s".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
