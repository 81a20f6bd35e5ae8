//! Unified (stateless) transport
//!
//! One HTTP request carries one JSON-RPC payload and its response carries
//! the reply inline. No session is created and the registry is never
//! touched.

use std::sync::Arc;

use crate::mcp::engine::McpEngine;
use crate::mcp::message::JsonRpcMessage;

/// Outcome of one exchange
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeReply {
    /// A reply to write back as the response body
    Message(JsonRpcMessage),
    /// The payload needed no reply (notification or client response)
    Accepted,
}

#[derive(Debug, Clone)]
pub struct StreamableTransport {
    engine: Arc<McpEngine>,
}

impl StreamableTransport {
    pub fn new(engine: Arc<McpEngine>) -> Self {
        Self { engine }
    }

    /// Decode `body`, run it to completion and return the reply. Decode
    /// failures are replied to with a JSON-RPC error, never an HTTP one.
    pub async fn handle_exchange(&self, body: &[u8]) -> ExchangeReply {
        let message = match JsonRpcMessage::from_slice(body) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Undecodable exchange payload: {}", e);
                return ExchangeReply::Message(JsonRpcMessage::error(None, &e));
            }
        };

        match self.engine.handle(message).await {
            Some(reply) => ExchangeReply::Message(reply),
            None => ExchangeReply::Accepted,
        }
    }
}
