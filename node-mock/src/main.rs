//! Mock Substrate node
//!
//! A lightweight JSON-RPC server answering storage and runtime-call queries
//! from seeded state. Designed for local development of the balances server.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use node_mock::{run_server, NodeState};

/// Polkadot's genesis hash, so the default registry accepts the mock
const DEFAULT_GENESIS_HASH: &str =
    "0x91b171bb158e2d3848fa23a9f1c25182fb8e20313b2c1eb49219da7a70ce90c3";

#[derive(Debug)]
struct Config {
    genesis_hash: String,
    chain_name: String,

    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let genesis_hash = env::var("MOCK_GENESIS_HASH")
            .unwrap_or_else(|_| DEFAULT_GENESIS_HASH.to_string());

        let chain_name = env::var("MOCK_CHAIN_NAME")
            .unwrap_or_else(|_| "Development".to_string());

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "9944".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            genesis_hash,
            chain_name,
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting mock Substrate node...");

    let config = Config::from_env()
        .context("Failed to load configuration")?;

    log::info!("Chain: {}", config.chain_name);
    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let state = Arc::new(NodeState::new(&config.genesis_hash, &config.chain_name));

    run_server(state, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
