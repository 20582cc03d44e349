//! Gatecrash Server - HTTP messaging bridge.
//!
//! This crate exposes the background engine over a small HTTP API so
//! browser surfaces (popup, page script) can drive it:
//!
//! - `POST /api/message` - dispatch a bridge command (tagged by `action`)
//! - `GET /api/status` - read the enabled flag
//! - `GET /api/rules` - inspect the installed header rules
//!
//! ## Example
//!
//! ```no_run
//! use gatecrash_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod commands;
pub mod error;
mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use gatecrash_storage::{JsonFileStore, KvStore, MemoryStore};

pub use commands::Command;
pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 48790;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Data directory for the settings store (None = in-memory).
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Creates a config for in-memory testing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a config with a specific data directory.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    Bind(SocketAddr, std::io::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] gatecrash_storage::StorageError),

    /// Rule installation error.
    #[error("rule host error: {0}")]
    Rules(#[from] ApiError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The HTTP messaging bridge server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let store: Arc<dyn KvStore> = match &config.data_dir {
            Some(dir) => Arc::new(JsonFileStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        let state = AppState::new(store)?;
        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        // CORS so extension surfaces can call the bridge
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/api/message", post(handlers::handle_message))
            .route("/api/status", get(handlers::get_status))
            .route("/api/rules", get(handlers::get_rules))
            .layer(cors)
            .with_state(state);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Gatecrash bridge on {}", self.addr);

        // SO_REUSEADDR so restarts are not blocked by lingering sockets
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Bind(self.addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::Bind(self.addr, e))?;
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::Bind(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::Bind(self.addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::Bind(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Bind(self.addr, e))?;

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
