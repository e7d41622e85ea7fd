//! Catalog store and conversation log backends.
//!
//! Provides the `CatalogStore` and `ConversationLog` traits with:
//! - `MemoryCatalog`: evaluates store queries over an in-memory catalog
//! - `ManticoreCatalog`: executes them against a Manticore Search table
//! - `MemoryConversationLog` / `JsonlConversationLog`: resolution record sinks
//!
//! Scoring stays in the core, so any store that can filter is enough.

pub mod log;
pub mod manticore;
pub mod memory;

pub use log::{JsonlConversationLog, MemoryConversationLog};
pub use manticore::{ManticoreCatalog, ManticoreConfig};
pub use memory::MemoryCatalog;

use std::future::Future;
use std::path::PathBuf;

use phonefinder_model::{CatalogRecord, ResolutionRecord};
use phonefinder_query::StoreQuery;
use thiserror::Error;

/// Errors from catalog store operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Query timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Failed to load catalog from {path:?}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Backend not available")]
    Unavailable,
}

/// Errors from appending to a conversation log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to write conversation log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode resolution record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Conversation log unavailable")]
    Unavailable,
}

/// Trait for catalog stores (in-memory, Manticore, etc.)
///
/// This abstraction allows swapping stores without changing ranking logic.
pub trait CatalogStore {
    /// Fetch every record matching all clauses of the query.
    fn query(
        &self,
        query: &StoreQuery,
    ) -> impl Future<Output = Result<Vec<CatalogRecord>, BackendError>> + Send;

    /// Check if the store is healthy.
    fn health_check(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Get the store name for logging.
    fn name(&self) -> &'static str;
}

/// Append-only sink for resolution records.
pub trait ConversationLog {
    fn append(
        &self,
        record: &ResolutionRecord,
    ) -> impl Future<Output = Result<(), LogError>> + Send;
}
