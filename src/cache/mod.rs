//! Balance cache
//!
//! - `envelope.rs` - the persisted `{ balances, timeStamp }` document and its merge rule
//! - `store.rs` - key-value persistence (files on disk, or memory)
//! - `writer.rs` - the actor that owns the envelope and serialises every write

mod envelope;
mod store;
mod writer;

pub use envelope::{AssetsBalancesPerAddress, AssetsBalancesPerChain, CacheEnvelope, ChainBalances};
pub use store::{CacheStore, FileStore, MemoryStore, ASSETS_NAME_IN_STORAGE};
pub use writer::CacheHandle;
