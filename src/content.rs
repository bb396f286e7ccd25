//! Canonical-Content Cache - per-document MathML deduplication
//!
//! Several symbols in one document usually share the same MathML (every
//! `x` in a paper renders identically). The cache resolves each distinct
//! value to a single `canonical_content` row: already-persisted values are
//! looked up in storage once, new values are registered as pending and
//! created in bulk before any symbol row references them.
//!
//! The cache is scoped to one document's run and discarded afterwards.

use std::collections::HashMap;
use crate::Result;
use crate::storage::SymbolStore;

/// Reference to a canonical content row, before or after it has an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRef {
    /// Row exists in storage with this id
    Persisted(i64),
    /// Row is queued for bulk creation; resolves to an id at flush
    Pending(usize),
}

/// Deduplicating cache over the `canonical_content` table.
#[derive(Debug, Default)]
pub struct ContentCache {
    refs: HashMap<String, ContentRef>,
    pending: Vec<String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a content value to its canonical reference.
    ///
    /// Checks the local map first, then storage; a value unknown to both is
    /// queued as pending. At most one storage write per distinct value per
    /// run, issued later by [`flush`](Self::flush).
    pub fn resolve<S: SymbolStore + ?Sized>(
        &mut self,
        store: &mut S,
        content: &str,
    ) -> Result<ContentRef> {
        if let Some(r) = self.refs.get(content) {
            return Ok(*r);
        }

        let r = match store.find_content(content)? {
            Some(id) => ContentRef::Persisted(id),
            None => {
                self.pending.push(content.to_string());
                ContentRef::Pending(self.pending.len() - 1)
            }
        };
        self.refs.insert(content.to_string(), r);
        Ok(r)
    }

    /// Number of values queued for creation
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bulk-create all pending rows, in chunks of at most `batch_size`.
    ///
    /// After a successful flush every cached value resolves to a persisted
    /// id. A storage error here is fatal for the document: proceeding would
    /// leave symbols referencing content rows that were never created.
    pub fn flush<S: SymbolStore + ?Sized>(
        &mut self,
        store: &mut S,
        batch_size: usize,
    ) -> Result<usize> {
        let mut ids = Vec::with_capacity(self.pending.len());
        for chunk in self.pending.chunks(batch_size.max(1)) {
            ids.extend(store.create_content(chunk)?);
        }

        for (content, id) in self.pending.iter().zip(&ids) {
            self.refs.insert(content.clone(), ContentRef::Persisted(*id));
        }
        let created = self.pending.len();
        self.pending.clear();
        Ok(created)
    }

    /// Persisted id for a content value, once flushed
    pub fn id_of(&self, content: &str) -> Option<i64> {
        match self.refs.get(content) {
            Some(ContentRef::Persisted(id)) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_identical_content_resolves_once() {
        let mut store = MemoryStore::new();
        let mut cache = ContentCache::new();

        let a = cache.resolve(&mut store, "<mi>x</mi>").unwrap();
        let b = cache.resolve(&mut store, "<mi>x</mi>").unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.pending_len(), 1);

        cache.flush(&mut store, 300).unwrap();
        assert_eq!(store.content.len(), 1);
        assert!(cache.id_of("<mi>x</mi>").is_some());
    }

    #[test]
    fn test_resolve_finds_previously_persisted_rows() {
        let mut store = MemoryStore::new();
        let existing = store.create_content(&["<mi>y</mi>".to_string()]).unwrap()[0];

        let mut cache = ContentCache::new();
        let r = cache.resolve(&mut store, "<mi>y</mi>").unwrap();
        assert_eq!(r, ContentRef::Persisted(existing));
        assert_eq!(cache.pending_len(), 0);
    }

    #[test]
    fn test_flush_chunks_pending_rows() {
        let mut store = MemoryStore::new();
        let mut cache = ContentCache::new();

        for i in 0..7 {
            cache.resolve(&mut store, &format!("<mn>{}</mn>", i)).unwrap();
        }

        let created = cache.flush(&mut store, 3).unwrap();
        assert_eq!(created, 7);
        // 7 rows at batch size 3: chunks of 3, 3, 1
        assert_eq!(store.calls_for("canonical_content"), 3);
    }

    #[test]
    fn test_flush_failure_is_propagated() {
        let mut store = MemoryStore::new().fail_on("canonical_content");
        let mut cache = ContentCache::new();
        cache.resolve(&mut store, "<mi>x</mi>").unwrap();

        assert!(cache.flush(&mut store, 300).is_err());
    }
}
