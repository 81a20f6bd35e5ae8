//! Configuration types for the MCP HTTP server

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// Default listen port when `PORT` is unset or unusable
pub const DEFAULT_PORT: u16 = 3000;

/// Errors raised while reading configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// MCP HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Reported to clients in the `initialize` result
    pub server_name: String,
    pub server_version: String,
    /// Maximum raw body accepted on `POST /messages`
    pub message_body_limit: usize,
    /// Maximum body accepted on `POST /mcp`
    pub exchange_body_limit: usize,
    /// Capacity of each session's push and inbox channels
    pub session_buffer: usize,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
    /// Close streams that have pushed nothing for this long. `None` keeps
    /// idle streams open indefinitely.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            server_name: "wishfinity-plusw".to_string(),
            server_version: "0.1.0".to_string(),
            message_body_limit: 4 * 1024 * 1024,
            exchange_body_limit: 1024 * 1024,
            session_buffer: 64,
            keep_alive: Duration::from_secs(15),
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self::default().with_port(port)
    }

    /// Build a configuration from `HOST`, `PORT` and `SSE_IDLE_TIMEOUT_SECS`.
    ///
    /// Unusable values are logged and replaced by their defaults; a bad
    /// environment never prevents the server from starting.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("HOST") {
            match parse_value::<IpAddr>("HOST", &raw) {
                Ok(ip) => config.addr.set_ip(ip),
                Err(e) => tracing::warn!("{}, using {}", e, config.addr.ip()),
            }
        }

        if let Some(raw) = lookup("PORT") {
            match parse_value::<u16>("PORT", &raw) {
                Ok(port) => config.addr.set_port(port),
                Err(e) => tracing::warn!("{}, using {}", e, DEFAULT_PORT),
            }
        }

        if let Some(raw) = lookup("SSE_IDLE_TIMEOUT_SECS") {
            match parse_value::<u64>("SSE_IDLE_TIMEOUT_SECS", &raw) {
                Ok(0) => config.idle_timeout = None,
                Ok(secs) => config.idle_timeout = Some(Duration::from_secs(secs)),
                Err(e) => tracing::warn!("{}, idle streams will not time out", e),
            }
        }

        config
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_name = name.into();
        self.server_version = version.into();
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}
