//! Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::state::NodeState;

pub fn create_router(state: Arc<NodeState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // JSON-RPC
        .route("/", post(rpc))

        // Health check
        .route("/health", get(health_check))

        // Seeding helpers
        .route("/mock/storage", post(seed_storage))
        .route("/mock/call", post(seed_call))

        // Shared state
        .with_state(state)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(state: Arc<NodeState>, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(state.clone());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Mock node listening on http://{}", addr);
    log::info!("⛓️  Genesis hash: {}", state.genesis_hash());
    log::info!("🌱 Seeding endpoints: POST /mock/storage, POST /mock/call");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Mock node running in the background of the current runtime.
///
/// Stops when dropped.
pub struct MockNode {
    state: Arc<NodeState>,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MockNode {
    /// Serve on an ephemeral port of 127.0.0.1
    pub async fn spawn(genesis_hash: &str, chain_name: &str) -> anyhow::Result<Self> {
        let state = Arc::new(NodeState::new(genesis_hash, chain_name));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown, stopped) = oneshot::channel::<()>();

        let app = create_router(state.clone());
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                stopped.await.ok();
            });
            if let Err(e) = server.await {
                log::error!("Mock node stopped with error: {}", e);
            }
        });

        log::info!("Mock node for {} at http://{}", chain_name, addr);
        Ok(Self {
            state,
            addr,
            shutdown: Some(shutdown),
            task,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}
