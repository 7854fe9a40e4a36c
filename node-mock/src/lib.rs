//! Mock Substrate node
//!
//! This crate provides both a standalone binary and library components
//! for serving the handful of JSON-RPC methods the balance fetchers use,
//! backed by seeded in-memory storage.

pub mod handlers;
pub mod server;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use server::{create_router, run_server, MockNode};
pub use state::NodeState;
pub use types::*;
