//! Storage Layer - SQLite-backed persistence behind a store trait
//!
//! System of record is SQLite with tables:
//! - documents(id, external_id, source_id)
//! - canonical_content(id, content)
//! - symbols(id, document_id, content_id)
//! - geometries(id, page, left, top, width, height)
//! - symbol_geometries(symbol_id, geometry_id)
//! - symbol_matches(source_symbol_id, target_symbol_id, rank)
//! - symbol_children(parent_symbol_id, child_symbol_id)
//!
//! The persister only talks to [`SymbolStore`], so it can be exercised
//! against [`MemoryStore`] without a database file.

pub mod schema;
pub mod sqlite;
pub mod memory;

pub use sqlite::{SqliteStore, DbStats};
pub use memory::MemoryStore;

use crate::Result;
use crate::symbol::Geometry;

/// A symbol row ready for insertion; ids refer to already-persisted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSymbol {
    pub document_id: i64,
    pub content_id: i64,
}

/// Join row attaching a persisted geometry to a persisted symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryLink {
    pub symbol_id: i64,
    pub geometry_id: i64,
}

/// One ranked match row between two persisted symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub source_symbol_id: i64,
    pub target_symbol_id: i64,
    pub rank: i32,
}

/// Parent/child join row between two persisted symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLink {
    pub parent_symbol_id: i64,
    pub child_symbol_id: i64,
}

/// Repository interface the batch persister writes through.
///
/// Every `create_*` call is one storage call for one chunk; chunking to the
/// configured batch sizes is the caller's job. Bulk creates return persisted
/// ids in input order where later steps need them.
pub trait SymbolStore {
    /// Look up a document by external id, creating it if absent.
    ///
    /// Idempotent: the same external id always resolves to the same row.
    fn upsert_document(&mut self, external_id: &str, source_id: &str) -> Result<i64>;

    /// Find an existing canonical content row by exact value
    fn find_content(&mut self, content: &str) -> Result<Option<i64>>;

    /// Create canonical content rows, returning their ids in input order
    fn create_content(&mut self, rows: &[String]) -> Result<Vec<i64>>;

    /// Create symbol rows, returning their ids in input order
    fn create_symbols(&mut self, rows: &[NewSymbol]) -> Result<Vec<i64>>;

    /// Create geometry rows, returning their ids in input order
    fn create_geometries(&mut self, rows: &[Geometry]) -> Result<Vec<i64>>;

    /// Create symbol→geometry join rows
    fn create_geometry_links(&mut self, rows: &[GeometryLink]) -> Result<()>;

    /// Create ranked match rows
    fn create_matches(&mut self, rows: &[NewMatch]) -> Result<()>;

    /// Create parent/child join rows
    fn create_child_links(&mut self, rows: &[ChildLink]) -> Result<()>;
}
