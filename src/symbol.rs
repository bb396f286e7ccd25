//! Symbol types - the per-document detection output consumed by the graph
//!
//! One `SymbolRecord` per detected symbol occurrence, as produced by the
//! upstream extractor. Geometry and match candidates arrive separately and
//! are attached to graph nodes by key.

use crate::key::SymbolKey;
use serde::{Deserialize, Serialize};

/// One detected symbol occurrence in a document.
///
/// Roots carry no parent; everything else names the key of its parent
/// occurrence in the same document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Structural identity of this occurrence
    pub key: SymbolKey,
    /// MathML markup for the symbol (deduplicated at persist time)
    pub mathml: String,
    /// Parent occurrence, if this symbol is nested inside another
    pub parent: Option<SymbolKey>,
}

impl SymbolRecord {
    /// Create a root symbol record
    pub fn new(key: SymbolKey, mathml: impl Into<String>) -> Self {
        Self {
            key,
            mathml: mathml.into(),
            parent: None,
        }
    }

    /// Set the parent key
    pub fn with_parent(mut self, parent: SymbolKey) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// On-page bounding box for a symbol, in page-relative units.
///
/// Optional per symbol; a symbol with no known geometry is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Page index (0-indexed)
    pub page: i32,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// One candidate corresponding symbol in a (possibly different) document.
///
/// Rank is not stored here: it is the 1-based position of the candidate in
/// its source symbol's ordered match list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Structural identity of the matched symbol
    pub target: SymbolKey,
    /// MathML shown for the match in reading interfaces
    pub mathml: String,
}

impl MatchCandidate {
    pub fn new(target: SymbolKey, mathml: impl Into<String>) -> Self {
        Self {
            target,
            mathml: mathml.into(),
        }
    }
}
