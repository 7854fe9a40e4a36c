//! HTTP API over the balance aggregator
//!
//! - `server.rs` - router, CORS and graceful shutdown
//! - `handlers.rs` - one handler per route
//! - `types.rs` - query and body shapes

pub mod handlers;
pub mod server;
pub mod types;
