//! Batch Persister - flushes one document's graph in FK-safe order
//!
//! Write order is fixed by the foreign keys: the document row first, then
//! canonical content, then symbols (which yields the key→id map), then
//! geometry rows and their joins, then matches, then parent/child joins.
//! Each collection is split into chunks no larger than the configured
//! per-entity batch size, one storage call per chunk.
//!
//! There is no transaction across steps: a failed chunk aborts the
//! document at that point and earlier writes stay in place. The document
//! upsert is idempotent, so a re-run does not duplicate the document row.

use std::collections::HashMap;
use tracing::debug;
use crate::{Error, Result};
use crate::config::BatchSizes;
use crate::content::ContentCache;
use crate::graph::SymbolGraph;
use crate::key::SymbolKey;
use crate::storage::{ChildLink, GeometryLink, NewMatch, NewSymbol, SymbolStore};

/// Row counts written for one document.
#[derive(Debug, Clone, Default)]
pub struct PersistReport {
    pub document_id: i64,
    pub canonical_content: usize,
    pub symbols: usize,
    pub geometries: usize,
    pub matches: usize,
    pub child_links: usize,
}

impl std::fmt::Display for PersistReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} symbols, {} content rows, {} geometries, {} matches, {} child links",
            self.symbols, self.canonical_content, self.geometries, self.matches, self.child_links
        )
    }
}

/// Writes a fully-built [`SymbolGraph`] through a [`SymbolStore`].
pub struct BatchPersister<'a, S: SymbolStore + ?Sized> {
    store: &'a mut S,
    sizes: BatchSizes,
}

impl<'a, S: SymbolStore + ?Sized> BatchPersister<'a, S> {
    pub fn new(store: &'a mut S, sizes: BatchSizes) -> Self {
        Self { store, sizes }
    }

    /// Persist one document's graph.
    ///
    /// `external_id` is the resolved document identifier (upsert key);
    /// `source_id` is the bundle name it came from.
    pub fn persist(
        &mut self,
        external_id: &str,
        source_id: &str,
        graph: &SymbolGraph,
    ) -> Result<PersistReport> {
        let mut report = PersistReport::default();

        // Step 1: the document row everything else hangs off
        let document_id = self.store.upsert_document(external_id, source_id)?;
        report.document_id = document_id;

        // Step 2: canonical content, deduplicated and created before any
        // symbol row that references it
        let mut cache = ContentCache::new();
        for node in graph.nodes() {
            cache.resolve(self.store, &node.mathml)?;
        }
        report.canonical_content = cache.flush(self.store, self.sizes.canonical_content)?;

        // Step 3: symbols, yielding the key→id map every later step needs
        let mut symbol_rows = Vec::with_capacity(graph.len());
        for node in graph.nodes() {
            let content_id = cache.id_of(&node.mathml).ok_or_else(|| {
                Error::Backend(format!("no content id for symbol {}", node.key))
            })?;
            symbol_rows.push(NewSymbol { document_id, content_id });
        }

        let mut symbol_ids = Vec::with_capacity(symbol_rows.len());
        for chunk in symbol_rows.chunks(self.sizes.symbols.max(1)) {
            symbol_ids.extend(self.store.create_symbols(chunk)?);
        }
        report.symbols = symbol_ids.len();

        let ids_by_key: HashMap<&SymbolKey, i64> = graph
            .nodes()
            .map(|node| &node.key)
            .zip(symbol_ids.iter().copied())
            .collect();

        // Step 4: geometries plus their symbol joins, only for nodes that
        // carry one
        let mut geometry_rows = Vec::new();
        let mut located_symbols = Vec::new();
        for node in graph.nodes() {
            if let Some(geometry) = node.geometry {
                geometry_rows.push(geometry);
                located_symbols.push(ids_by_key[&node.key]);
            }
        }

        let mut geometry_ids = Vec::with_capacity(geometry_rows.len());
        for chunk in geometry_rows.chunks(self.sizes.geometries.max(1)) {
            geometry_ids.extend(self.store.create_geometries(chunk)?);
        }
        report.geometries = geometry_ids.len();

        let links: Vec<GeometryLink> = located_symbols
            .iter()
            .zip(&geometry_ids)
            .map(|(&symbol_id, &geometry_id)| GeometryLink { symbol_id, geometry_id })
            .collect();
        for chunk in links.chunks(self.sizes.geometries.max(1)) {
            self.store.create_geometry_links(chunk)?;
        }

        // Step 5: ranked matches, both endpoints resolved through the map
        let mut match_rows = Vec::new();
        for node in graph.nodes() {
            let source_symbol_id = ids_by_key[&node.key];
            for (position, candidate) in node.matches.iter().enumerate() {
                let target_symbol_id =
                    *ids_by_key.get(&candidate.target).ok_or(Error::UnknownSymbol {
                        key: candidate.target.clone(),
                        context: "match target",
                    })?;
                match_rows.push(NewMatch {
                    source_symbol_id,
                    target_symbol_id,
                    rank: position as i32 + 1,
                });
            }
        }
        for chunk in match_rows.chunks(self.sizes.matches.max(1)) {
            self.store.create_matches(chunk)?;
        }
        report.matches = match_rows.len();

        // Step 6: parent/child joins
        let mut child_rows = Vec::new();
        for node in graph.nodes() {
            let parent_symbol_id = ids_by_key[&node.key];
            for child in &node.children {
                let child_symbol_id = *ids_by_key.get(child).ok_or(Error::UnknownSymbol {
                    key: child.clone(),
                    context: "child link",
                })?;
                child_rows.push(ChildLink { parent_symbol_id, child_symbol_id });
            }
        }
        for chunk in child_rows.chunks(self.sizes.child_links.max(1)) {
            self.store.create_child_links(chunk)?;
        }
        report.child_links = child_rows.len();

        debug!("persisted document {}: {}", external_id, report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use crate::storage::MemoryStore;
    use crate::symbol::{Geometry, MatchCandidate, SymbolRecord};

    fn key(token: i32) -> SymbolKey {
        SymbolKey::new("main.tex", 0, token)
    }

    fn geometry() -> Geometry {
        Geometry { page: 1, left: 0.1, top: 0.2, width: 0.05, height: 0.02 }
    }

    fn persist(
        store: &mut MemoryStore,
        sizes: BatchSizes,
        graph: &SymbolGraph,
    ) -> Result<PersistReport> {
        BatchPersister::new(store, sizes).persist("s2-abc", "1703.01234", graph)
    }

    #[test]
    fn test_shared_content_is_deduplicated() {
        // One root "x" with one child "x" (same content) and a geometry on
        // the root only.
        let records = vec![
            SymbolRecord::new(key(0), "<mi>x</mi>"),
            SymbolRecord::new(key(1), "<mi>x</mi>").with_parent(key(0)),
        ];
        let mut graph = SymbolGraph::build(records).unwrap();
        let mut boxes = Map::new();
        boxes.insert(key(0), geometry());
        graph.attach_locations(boxes);

        let mut store = MemoryStore::new();
        let report = persist(&mut store, BatchSizes::default(), &graph).unwrap();

        assert_eq!(store.content.len(), 1);
        assert_eq!(store.symbols.len(), 2);
        assert_eq!(store.symbols[0].content_id, store.symbols[1].content_id);
        assert_eq!(store.geometries.len(), 1);
        assert_eq!(store.geometry_links.len(), 1);
        // geometry attached to the root, the first created symbol
        assert_eq!(store.geometry_links[0].symbol_id, 1);
        assert_eq!(store.child_links.len(), 1);
        assert_eq!(report.symbols, 2);
        assert_eq!(report.canonical_content, 1);
    }

    #[test]
    fn test_chunking_issues_ceil_n_over_c_calls() {
        let records: Vec<_> = (0..10)
            .map(|i| SymbolRecord::new(key(i), format!("<mn>{}</mn>", i)))
            .collect();
        let graph = SymbolGraph::build(records).unwrap();

        let sizes = BatchSizes { symbols: 3, canonical_content: 4, ..Default::default() };
        let mut store = MemoryStore::new();
        persist(&mut store, sizes, &graph).unwrap();

        // 10 symbols at batch 3 → 4 calls; 10 content rows at batch 4 → 3
        assert_eq!(store.calls_for("symbols"), 4);
        assert_eq!(store.calls_for("canonical_content"), 3);
        assert_eq!(store.symbols.len(), 10);
    }

    #[test]
    fn test_match_ranks_are_contiguous_in_input_order() {
        let records = vec![
            SymbolRecord::new(key(0), "<mi>a</mi>"),
            SymbolRecord::new(key(1), "<mi>b</mi>"),
            SymbolRecord::new(key(2), "<mi>c</mi>"),
        ];
        let mut graph = SymbolGraph::build(records).unwrap();
        let mut matches = Map::new();
        matches.insert(
            key(0),
            vec![
                MatchCandidate::new(key(1), "<mi>b</mi>"),
                MatchCandidate::new(key(2), "<mi>c</mi>"),
            ],
        );
        graph.attach_matches(matches).unwrap();

        let mut store = MemoryStore::new();
        persist(&mut store, BatchSizes::default(), &graph).unwrap();

        assert_eq!(store.matches.len(), 2);
        assert_eq!(store.matches[0].rank, 1);
        assert_eq!(store.matches[0].target_symbol_id, 2);
        assert_eq!(store.matches[1].rank, 2);
        assert_eq!(store.matches[1].target_symbol_id, 3);
    }

    #[test]
    fn test_repeat_run_upserts_single_document() {
        let graph = SymbolGraph::build(vec![SymbolRecord::new(key(0), "<mi>x</mi>")]).unwrap();
        let mut store = MemoryStore::new();

        persist(&mut store, BatchSizes::default(), &graph).unwrap();
        persist(&mut store, BatchSizes::default(), &graph).unwrap();

        assert_eq!(store.documents.len(), 1);
    }

    #[test]
    fn test_unknown_match_target_aborts_before_writing_matches() {
        let records = vec![SymbolRecord::new(key(0), "<mi>a</mi>")];
        let mut graph = SymbolGraph::build(records).unwrap();
        let mut matches = Map::new();
        matches.insert(key(0), vec![MatchCandidate::new(key(9), "<mi>z</mi>")]);
        graph.attach_matches(matches).unwrap();

        let mut store = MemoryStore::new();
        let err = persist(&mut store, BatchSizes::default(), &graph).unwrap_err();

        assert!(matches!(err, Error::UnknownSymbol { context: "match target", .. }));
        assert!(store.matches.is_empty());
        // symbols were already written; earlier steps are not rolled back
        assert_eq!(store.symbols.len(), 1);
    }

    #[test]
    fn test_chunk_failure_aborts_at_point_of_failure() {
        let records = vec![
            SymbolRecord::new(key(0), "<mi>x</mi>"),
            SymbolRecord::new(key(1), "<mi>y</mi>").with_parent(key(0)),
        ];
        let graph = SymbolGraph::build(records).unwrap();

        let mut store = MemoryStore::new().fail_on("symbols");
        let err = persist(&mut store, BatchSizes::default(), &graph).unwrap_err();

        assert!(matches!(err, Error::Backend(_)));
        // content landed before the failing step and stays in place
        assert_eq!(store.content.len(), 2);
        assert!(store.symbols.is_empty());
        assert!(store.child_links.is_empty());
    }

    #[test]
    fn test_every_child_link_had_a_parent_reference() {
        let records = vec![
            SymbolRecord::new(key(0), "<mi>a</mi>"),
            SymbolRecord::new(key(1), "<mi>b</mi>").with_parent(key(0)),
            SymbolRecord::new(key(2), "<mi>c</mi>").with_parent(key(0)),
            SymbolRecord::new(key(3), "<mi>d</mi>").with_parent(key(1)),
        ];
        let graph = SymbolGraph::build(records).unwrap();

        let mut store = MemoryStore::new();
        persist(&mut store, BatchSizes::default(), &graph).unwrap();

        assert_eq!(store.child_links.len(), 3);
        for link in &store.child_links {
            // ids are 1-based insertion order, mirroring graph order
            let parent_idx = (link.parent_symbol_id - 1) as usize;
            let child_idx = (link.child_symbol_id - 1) as usize;
            assert!(parent_idx < child_idx);
        }
    }
}
