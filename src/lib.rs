//! Wishfinity MCP - Model Context Protocol server for Wishfinity +W save links
//!
//! Exposes one tool, `get_wishfinity_save_link`, over two HTTP transports:
//!
//! - event stream: `GET /sse` opens a session, `POST /messages?sessionId=..`
//!   feeds it, replies arrive on the stream
//! - streamable: `POST /mcp` carries one exchange, the reply is inline
//!
//! ## Example
//!
//! ```rust,no_run
//! use wishfinity_mcp::{McpHttpServer, ServerConfig, ToolRegistry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! McpHttpServer::builder(ToolRegistry::with_defaults())
//!     .with_config(ServerConfig::from_env())
//!     .build()
//!     .serve()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export main API
pub use config::ServerConfig;
pub use error::{ProtocolError, TransportError};
pub use mcp::{mcp_router, AppState, McpEngine};
pub use server::{McpHttpServer, McpHttpServerBuilder};
pub use session::{Session, SessionId, SessionRegistry};
pub use tools::{ToolDescriptor, ToolHandler, ToolInput, ToolRegistry};
pub use transport::{SseTransport, StreamableTransport};
