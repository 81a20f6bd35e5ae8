//! Wishfinity MCP server binary
//!
//! ```bash
//! PORT=3000 RUST_LOG=wishfinity_mcp=debug wishfinity-mcp
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wishfinity_mcp::{McpHttpServer, ServerConfig, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wishfinity_mcp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Wishfinity MCP server v{}", env!("CARGO_PKG_VERSION"));

    McpHttpServer::builder(ToolRegistry::with_defaults())
        .with_config(ServerConfig::from_env())
        .build()
        .serve()
        .await
}
