//! JSON-RPC 2.0 message model
//!
//! Payloads are decoded by shape into one of four variants. Anything that is
//! not a single object tagged `"jsonrpc": "2.0"` with a recognizable shape is
//! rejected rather than guessed at.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// The `"jsonrpc": "2.0"` marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version2;

impl Serialize for Version2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for Version2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == "2.0" {
            Ok(Version2)
        } else {
            Err(de::Error::custom(format!(
                "unsupported jsonrpc version {version:?}"
            )))
        }
    }
}

/// Request identifier used to correlate a response with its request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: Version2,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: Version2,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Version2,
    pub id: RequestId,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Error reply. `id` is `null` when the failing payload could not be
/// decoded far enough to recover its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub jsonrpc: Version2,
    pub id: Option<RequestId>,
    pub error: ErrorObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
}

enum Shape {
    Request,
    Notification,
    Response,
    Error,
}

impl JsonRpcMessage {
    /// Decode a raw body. Invalid JSON is a parse error; valid JSON of the
    /// wrong shape is an invalid request.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let shape = match &value {
            Value::Object(object) => {
                if object.contains_key("method") {
                    if object.contains_key("id") {
                        Shape::Request
                    } else {
                        Shape::Notification
                    }
                } else if object.contains_key("result") {
                    Shape::Response
                } else if object.contains_key("error") {
                    Shape::Error
                } else {
                    return Err(ProtocolError::InvalidRequest(
                        "unrecognized message shape".to_string(),
                    ));
                }
            }
            Value::Array(_) => {
                return Err(ProtocolError::InvalidRequest(
                    "batch messages are not supported".to_string(),
                ))
            }
            _ => {
                return Err(ProtocolError::InvalidRequest(
                    "expected a JSON object".to_string(),
                ))
            }
        };

        let decoded = match shape {
            Shape::Request => serde_json::from_value(value).map(JsonRpcMessage::Request),
            Shape::Notification => serde_json::from_value(value).map(JsonRpcMessage::Notification),
            Shape::Response => serde_json::from_value(value).map(JsonRpcMessage::Response),
            Shape::Error => serde_json::from_value(value).map(JsonRpcMessage::Error),
        };
        decoded.map_err(|e| ProtocolError::InvalidRequest(e.to_string()))
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        JsonRpcMessage::Response(Response {
            jsonrpc: Version2,
            id,
            result,
        })
    }

    pub fn error(id: Option<RequestId>, error: &ProtocolError) -> Self {
        JsonRpcMessage::Error(ErrorResponse {
            jsonrpc: Version2,
            id,
            error: ErrorObject {
                code: error.code().into(),
                message: error.to_string(),
                data: Some(error.data()),
            },
        })
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(e) => e.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
