//! Session-scoped conversation history.
//!
//! Exchanges are persisted in SQLite ([`SqliteHistoryStore`]) and the most
//! recent ones per session are kept in memory ([`HistoryCache`]). A
//! background [`Sweeper`] drops sessions that have gone quiet; their history
//! stays on disk and is loaded back on the next access.

pub mod cache;
pub mod context;
pub mod error;
pub mod exchange;
pub mod store;
pub mod sweeper;

pub use cache::{CacheConfig, HistoryCache, DEFAULT_MAX_CACHED_EXCHANGES};
pub use context::build_context;
pub use error::{HistoryError, Result};
pub use exchange::Exchange;
pub use store::{HistoryStore, SqliteHistoryStore};
pub use sweeper::{Sweeper, SweeperConfig, SweeperHandle};
