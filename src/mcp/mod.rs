//! MCP (Model Context Protocol) layer
//!
//! JSON-RPC message model, the protocol engine, and the HTTP routes that
//! front the transports.

pub mod engine;
pub mod message;
pub mod server;

pub use engine::McpEngine;
pub use message::{JsonRpcMessage, RequestId};
pub use server::{mcp_router, serve_mcp_http, AppState};
