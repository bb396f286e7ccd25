//! SQLite storage implementation

use std::path::Path;
use std::time::Duration;
use rusqlite::{Connection, OptionalExtension, params};
use crate::{Error, Result};
use crate::symbol::Geometry;
use super::schema;
use super::{ChildLink, GeometryLink, NewMatch, NewSymbol, SymbolStore};

/// SQLite-backed storage for the symbol graph
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist).
    ///
    /// Does not create tables; call [`initialize_schema`](Self::initialize_schema)
    /// once at process startup before persisting anything.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Several workers may write to the same file; wait out their locks
        // instead of failing immediately.
        conn.busy_timeout(Duration::from_secs(30))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database with the schema applied (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create all tables and indexes. Idempotent.
    pub fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Read Operations ==========

    /// Get a document id by external identifier
    pub fn find_document(&self, external_id: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM documents WHERE external_id = ?1",
                [external_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get (symbol id, content id) pairs for a document, in insertion order
    pub fn symbols_for_document(&self, document_id: i64) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content_id FROM symbols WHERE document_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([document_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get (target symbol id, rank) pairs for a source symbol, by rank
    pub fn matches_for_symbol(&self, source_symbol_id: i64) -> Result<Vec<(i64, i32)>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_symbol_id, rank FROM symbol_matches WHERE source_symbol_id = ?1 ORDER BY rank",
        )?;
        let rows = stmt
            .query_map([source_symbol_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get child symbol ids of a parent symbol
    pub fn children_of(&self, parent_symbol_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT child_symbol_id FROM symbol_children WHERE parent_symbol_id = ?1",
        )?;
        let rows = stmt
            .query_map([parent_symbol_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get the geometry attached to a symbol, if any
    pub fn geometry_for_symbol(&self, symbol_id: i64) -> Result<Option<Geometry>> {
        self.conn
            .query_row(
                r#"
                SELECT g.page, g."left", g."top", g.width, g.height
                FROM geometries g
                JOIN symbol_geometries sg ON sg.geometry_id = g.id
                WHERE sg.symbol_id = ?1
                "#,
                [symbol_id],
                |row| {
                    Ok(Geometry {
                        page: row.get(0)?,
                        left: row.get(1)?,
                        top: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn count(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            documents: self.count("documents")?,
            canonical_content: self.count("canonical_content")?,
            symbols: self.count("symbols")?,
            geometries: self.count("geometries")?,
            matches: self.count("symbol_matches")?,
            child_links: self.count("symbol_children")?,
        })
    }
}

impl SymbolStore for SqliteStore {
    fn upsert_document(&mut self, external_id: &str, source_id: &str) -> Result<i64> {
        // Concurrent workers may race on the same external id; let the
        // conflict resolve in SQLite and re-select the winner's row.
        self.conn.execute(
            "INSERT INTO documents (external_id, source_id) VALUES (?1, ?2) \
             ON CONFLICT(external_id) DO NOTHING",
            params![external_id, source_id],
        )?;
        self.find_document(external_id)?.ok_or_else(|| {
            Error::Backend(format!("document {} missing after upsert", external_id))
        })
    }

    fn find_content(&mut self, content: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM canonical_content WHERE content = ?1",
                [content],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn create_content(&mut self, rows: &[String]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        {
            // A worker on another document may persist the same content
            // value between this document's lookup and its flush, so the
            // insert yields to an existing row and the id is re-selected.
            let mut insert = tx.prepare(
                "INSERT INTO canonical_content (content) VALUES (?1) \
                 ON CONFLICT(content) DO NOTHING",
            )?;
            let mut select = tx.prepare("SELECT id FROM canonical_content WHERE content = ?1")?;
            for content in rows {
                insert.execute([content])?;
                let id: i64 = select.query_row([content], |row| row.get(0))?;
                ids.push(id);
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn create_symbols(&mut self, rows: &[NewSymbol]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt =
                tx.prepare("INSERT INTO symbols (document_id, content_id) VALUES (?1, ?2)")?;
            for row in rows {
                stmt.execute(params![row.document_id, row.content_id])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn create_geometries(&mut self, rows: &[Geometry]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO geometries (page, "left", "top", width, height) VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )?;
            for g in rows {
                stmt.execute(params![g.page, g.left, g.top, g.width, g.height])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn create_geometry_links(&mut self, rows: &[GeometryLink]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbol_geometries (symbol_id, geometry_id) VALUES (?1, ?2)",
            )?;
            for link in rows {
                stmt.execute(params![link.symbol_id, link.geometry_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn create_matches(&mut self, rows: &[NewMatch]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbol_matches (source_symbol_id, target_symbol_id, rank) VALUES (?1, ?2, ?3)",
            )?;
            for m in rows {
                stmt.execute(params![m.source_symbol_id, m.target_symbol_id, m.rank])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn create_child_links(&mut self, rows: &[ChildLink]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbol_children (parent_symbol_id, child_symbol_id) VALUES (?1, ?2)",
            )?;
            for link in rows {
                stmt.execute(params![link.parent_symbol_id, link.child_symbol_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    pub documents: usize,
    pub canonical_content: usize,
    pub symbols: usize,
    pub geometries: usize,
    pub matches: usize,
    pub child_links: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Documents: {}", self.documents)?;
        writeln!(f, "  Canonical content: {}", self.canonical_content)?;
        writeln!(f, "  Symbols: {}", self.symbols)?;
        writeln!(f, "  Geometries: {}", self.geometries)?;
        writeln!(f, "  Matches: {}", self.matches)?;
        writeln!(f, "  Child links: {}", self.child_links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_document_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let first = store.upsert_document("s2-abc", "1703.01234").unwrap();
        let second = store.upsert_document("s2-abc", "1703.01234").unwrap();
        assert_eq!(first, second);

        assert_eq!(store.stats().unwrap().documents, 1);
    }

    #[test]
    fn test_create_content_yields_existing_row_on_duplicate() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let first = store.create_content(&["<mi>x</mi>".to_string()]).unwrap();
        let second = store.create_content(&["<mi>x</mi>".to_string()]).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.stats().unwrap().canonical_content, 1);
    }

    #[test]
    fn test_concurrent_documents_sharing_content_both_flush() {
        // Two workers, one database file, same MathML in both documents.
        // Each cache resolves before either flushes, so both queue the
        // value; the second flush must land on the first one's row instead
        // of failing the document.
        use crate::content::ContentCache;

        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("symload.db");
        let mut store_a = SqliteStore::open(&database).unwrap();
        store_a.initialize_schema().unwrap();
        let mut store_b = SqliteStore::open(&database).unwrap();

        let mut cache_a = ContentCache::new();
        let mut cache_b = ContentCache::new();
        cache_a.resolve(&mut store_a, "<mi>x</mi>").unwrap();
        cache_b.resolve(&mut store_b, "<mi>x</mi>").unwrap();

        cache_a.flush(&mut store_a, 300).unwrap();
        cache_b.flush(&mut store_b, 300).unwrap();

        assert_eq!(cache_a.id_of("<mi>x</mi>"), cache_b.id_of("<mi>x</mi>"));
        assert_eq!(store_a.stats().unwrap().canonical_content, 1);
    }

    #[test]
    fn test_concurrent_upserts_share_one_document_row() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("symload.db");
        let mut store_a = SqliteStore::open(&database).unwrap();
        store_a.initialize_schema().unwrap();
        let mut store_b = SqliteStore::open(&database).unwrap();

        let a = store_a.upsert_document("s2-abc", "1703.01234v1").unwrap();
        let b = store_b.upsert_document("s2-abc", "1703.01234v2").unwrap();

        assert_eq!(a, b);
        assert_eq!(store_a.stats().unwrap().documents, 1);
    }

    #[test]
    fn test_find_content() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        assert!(store.find_content("<mi>x</mi>").unwrap().is_none());
        let ids = store.create_content(&["<mi>x</mi>".to_string()]).unwrap();
        assert_eq!(store.find_content("<mi>x</mi>").unwrap(), Some(ids[0]));
    }

    #[test]
    fn test_bulk_create_returns_ids_in_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let doc = store.upsert_document("s2-abc", "1703.01234").unwrap();
        let content = store.create_content(&["<mi>x</mi>".to_string()]).unwrap();

        let rows = vec![
            NewSymbol { document_id: doc, content_id: content[0] },
            NewSymbol { document_id: doc, content_id: content[0] },
            NewSymbol { document_id: doc, content_id: content[0] },
        ];
        let ids = store.create_symbols(&rows).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);

        let persisted = store.symbols_for_document(doc).unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(persisted[0].0, ids[0]);
    }

    #[test]
    fn test_geometry_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let doc = store.upsert_document("s2-abc", "1703.01234").unwrap();
        let content = store.create_content(&["<mi>x</mi>".to_string()]).unwrap();
        let symbols = store
            .create_symbols(&[NewSymbol { document_id: doc, content_id: content[0] }])
            .unwrap();

        let geometry = Geometry { page: 2, left: 0.1, top: 0.25, width: 0.05, height: 0.02 };
        let geometries = store.create_geometries(&[geometry]).unwrap();
        store
            .create_geometry_links(&[GeometryLink {
                symbol_id: symbols[0],
                geometry_id: geometries[0],
            }])
            .unwrap();

        let fetched = store.geometry_for_symbol(symbols[0]).unwrap().unwrap();
        assert_eq!(fetched.page, 2);
        assert!((fetched.left - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.initialize_schema().unwrap();
    }
}
