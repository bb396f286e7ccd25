//! Symbol Graph - In-memory representation of one document's symbol hierarchy
//!
//! Built from the extractor's records before any node has a database id.
//! Every node is reachable by its structural key, and every parent/child
//! edge is mutual. Geometry and ranked matches are attached to the graph
//! after construction; the persister then flushes it in one pass.

use std::collections::HashMap;
use tracing::warn;
use crate::{Error, Result};
use crate::key::SymbolKey;
use crate::symbol::{Geometry, MatchCandidate, SymbolRecord};

/// One node in the symbol graph.
#[derive(Debug, Clone)]
pub struct SymbolNode {
    /// Structural identity of this occurrence
    pub key: SymbolKey,
    /// MathML markup (shared content, deduplicated at persist time)
    pub mathml: String,
    /// Parent occurrence, if nested
    pub parent: Option<SymbolKey>,
    /// Child occurrences, in input order
    pub children: Vec<SymbolKey>,
    /// On-page bounding box, if the locator produced one
    pub geometry: Option<Geometry>,
    /// Ranked match candidates; position in this list is the rank
    pub matches: Vec<MatchCandidate>,
}

/// In-memory symbol graph for one document.
///
/// Nodes are keyed by [`SymbolKey`] and iterated in input order, so a run
/// over the same extractor output persists rows in the same order.
#[derive(Debug, Default)]
pub struct SymbolGraph {
    nodes: HashMap<SymbolKey, SymbolNode>,
    order: Vec<SymbolKey>,
}

impl SymbolGraph {
    /// Build the graph from the extractor's records.
    ///
    /// Fails on a duplicate structural key, or on a record whose parent key
    /// names no record in the same batch. Parent/child edges are wired
    /// mutually: every child list entry has a matching parent reference.
    pub fn build(records: Vec<SymbolRecord>) -> Result<Self> {
        let mut graph = Self::default();

        for record in &records {
            if graph.nodes.contains_key(&record.key) {
                return Err(Error::DuplicateSymbol(record.key.clone()));
            }
            graph.order.push(record.key.clone());
            graph.nodes.insert(
                record.key.clone(),
                SymbolNode {
                    key: record.key.clone(),
                    mathml: record.mathml.clone(),
                    parent: record.parent.clone(),
                    children: Vec::new(),
                    geometry: None,
                    matches: Vec::new(),
                },
            );
        }

        // Second pass: wire children onto parents, in input order
        for record in &records {
            if let Some(parent_key) = &record.parent {
                let parent = graph.nodes.get_mut(parent_key).ok_or_else(|| {
                    Error::MissingParent {
                        child: record.key.clone(),
                        parent: parent_key.clone(),
                    }
                })?;
                parent.children.push(record.key.clone());
            }
        }

        Ok(graph)
    }

    /// Get a node by its structural key
    pub fn get(&self, key: &SymbolKey) -> Option<&SymbolNode> {
        self.nodes.get(key)
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in input order
    pub fn nodes(&self) -> impl Iterator<Item = &SymbolNode> {
        self.order.iter().filter_map(|key| self.nodes.get(key))
    }

    /// Attach bounding boxes to the nodes that have one.
    ///
    /// A geometry key with no matching node means the locator and the
    /// extractor disagree; that is tolerated. Returns the number of entries
    /// ignored for that reason. Nodes absent from `boxes` keep no geometry.
    pub fn attach_locations(&mut self, boxes: HashMap<SymbolKey, Geometry>) -> usize {
        let mut ignored = 0;
        for (key, geometry) in boxes {
            match self.nodes.get_mut(&key) {
                Some(node) => node.geometry = Some(geometry),
                None => {
                    warn!("geometry entry for unknown symbol {}, ignoring", key);
                    ignored += 1;
                }
            }
        }
        ignored
    }

    /// Attach ranked match candidates to their source nodes.
    ///
    /// Precondition: each candidate list is already in rank order; the rank
    /// persisted later is the 1-based position in the list, nothing is
    /// re-sorted here. A source key absent from the graph is a fatal input
    /// error for the document.
    pub fn attach_matches(
        &mut self,
        matches: HashMap<SymbolKey, Vec<MatchCandidate>>,
    ) -> Result<()> {
        for (key, candidates) in matches {
            let node = self.nodes.get_mut(&key).ok_or(Error::UnknownSymbol {
                key: key.clone(),
                context: "match source",
            })?;
            node.matches = candidates;
        }
        Ok(())
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            symbols: self.nodes.len(),
            roots: self.nodes.values().filter(|n| n.parent.is_none()).count(),
            with_geometry: self.nodes.values().filter(|n| n.geometry.is_some()).count(),
            match_candidates: self.nodes.values().map(|n| n.matches.len()).sum(),
            child_links: self.nodes.values().map(|n| n.children.len()).sum(),
        }
    }
}

/// Statistics about a symbol graph
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub symbols: usize,
    pub roots: usize,
    pub with_geometry: usize,
    pub match_candidates: usize,
    pub child_links: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Symbol Graph Statistics:")?;
        writeln!(f, "  Symbols: {} ({} roots)", self.symbols, self.roots)?;
        writeln!(f, "  With geometry: {}", self.with_geometry)?;
        writeln!(f, "  Match candidates: {}", self.match_candidates)?;
        writeln!(f, "  Child links: {}", self.child_links)
    }
}
