//! # Symload - Symbol graph persistence for paper reading pipelines
//!
//! Takes per-paper symbol detection output (a hierarchy of symbol
//! occurrences, their on-page locations, and candidate matches to symbols
//! in other papers) and persists it into a relational store.
//!
//! Symload provides:
//! - A structural identity key for symbols that is stable before any
//!   database id exists
//! - An in-memory symbol graph with mutual parent/child edges
//! - Per-document MathML deduplication into canonical content rows
//! - A batch persister that writes in foreign-key-safe order, chunked to
//!   configurable per-entity batch sizes
//! - SQLite-backed storage behind a store trait, so persistence is testable
//!   against an in-memory fake

pub mod key;
pub mod symbol;
pub mod graph;
pub mod content;
pub mod persister;
pub mod source;
pub mod pipeline;
pub mod storage;
pub mod config;

// Re-exports for convenient access
pub use key::SymbolKey;
pub use symbol::{Geometry, MatchCandidate, SymbolRecord};
pub use graph::SymbolGraph;
pub use content::ContentCache;
pub use persister::{BatchPersister, PersistReport};
pub use storage::{SqliteStore, SymbolStore};

/// Result type alias for Symload operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Symload operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid symbol key: {0}")]
    InvalidKey(String),

    #[error("Symbol {child} references parent {parent} not present in the same document")]
    MissingParent { child: SymbolKey, parent: SymbolKey },

    #[error("Duplicate symbol key in document: {0}")]
    DuplicateSymbol(SymbolKey),

    #[error("{context} references unknown symbol {key}")]
    UnknownSymbol { key: SymbolKey, context: &'static str },
}
