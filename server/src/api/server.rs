use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use polkagate_balances::{AggregatorConfig, BalanceAggregator};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;

pub async fn start_server(addr: &str) -> anyhow::Result<()> {
    let config = AggregatorConfig::from_env();
    let aggregator = Arc::new(BalanceAggregator::from_config(&config)?);

    let app = create_router(aggregator).layer(cors_layer()?);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn create_router(aggregator: Arc<BalanceAggregator>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/chains", get(handlers::list_chains_handler))
        .route("/api/balances", get(handlers::get_balances_handler))
        .route(
            "/api/balances/refresh",
            post(handlers::refresh_balances_handler),
        )
        .route(
            "/api/accounts/:address/:genesis_hash",
            get(handlers::get_account_balances_handler),
        )
        .route(
            "/api/accounts/:address/:genesis_hash/pooled",
            get(handlers::get_pooled_balance_handler),
        )
        .route(
            "/api/accounts/:address/:genesis_hash/assets/:asset_id",
            get(handlers::get_asset_info_handler),
        )
        .route("/api/prices", get(handlers::get_prices_handler))
        .with_state(aggregator)
}

/// Set ALLOWED_ORIGINS="https://a.example,https://b.example" to restrict origins.
/// If not set, allows any origin (development mode).
fn cors_layer() -> anyhow::Result<CorsLayer> {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            log::info!("CORS configured for origins: {}", origins);
            let origin_list = origins
                .split(',')
                .map(|s| s.trim().parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
            Ok(CorsLayer::new()
                .allow_origin(origin_list)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        _ => {
            log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
            Ok(CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any))
        }
    }
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutdown signal received, exiting gracefully...");
}
