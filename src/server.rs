//! Server builder and orchestration

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ServerConfig;
use crate::mcp::engine::McpEngine;
use crate::mcp::server::{serve_mcp_http, AppState};
use crate::session::SessionRegistry;
use crate::tools::ToolRegistry;

/// MCP HTTP server hosting a tool registry over both transports
pub struct McpHttpServer {
    state: AppState,
}

impl McpHttpServer {
    /// Create a builder for configuring the server
    pub fn builder(tools: ToolRegistry) -> McpHttpServerBuilder {
        McpHttpServerBuilder::new(tools)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn sessions(&self) -> &SessionRegistry {
        self.state.sessions()
    }

    /// Bind the configured address and serve until ctrl-c.
    ///
    /// Failing to bind is the only error that stops the server.
    pub async fn serve(self) -> Result<()> {
        let addr = self.state.config.addr;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!("MCP SSE server listening on port {}", addr.port());
        tracing::info!("  event stream: http://{}/sse", addr);
        tracing::info!("  streamable:   http://{}/mcp", addr);

        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve_with_listener<F>(
        self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match serve_mcp_http(listener, self.state, shutdown).await {
            Ok(()) => tracing::info!("MCP server stopped"),
            Err(e) => tracing::error!("MCP server error: {}", e),
        }
        Ok(())
    }
}

/// Builder for configuring the server
pub struct McpHttpServerBuilder {
    tools: ToolRegistry,
    config: ServerConfig,
    registry: SessionRegistry,
}

impl McpHttpServerBuilder {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            config: ServerConfig::default(),
            registry: SessionRegistry::new(),
        }
    }

    /// Listen on the specified port
    pub fn with_port(mut self, port: u16) -> Self {
        self.config = self.config.with_port(port);
        self
    }

    /// Use a custom configuration
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing session registry
    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build the server
    pub fn build(self) -> McpHttpServer {
        let engine = Arc::new(McpEngine::from_config(self.tools, &self.config));
        McpHttpServer {
            state: AppState::new(engine, self.registry, self.config),
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}
