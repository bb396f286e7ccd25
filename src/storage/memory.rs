//! In-memory store - a fake backend for exercising the persister
//!
//! Records every row it is handed and counts storage calls per entity kind,
//! so tests can assert chunking behavior (ceil(N/C) calls) and inject a
//! failure at a chosen step without touching SQLite.

use std::collections::HashMap;
use crate::{Error, Result};
use crate::symbol::Geometry;
use super::{ChildLink, GeometryLink, NewMatch, NewSymbol, SymbolStore};

/// In-memory fake implementing [`SymbolStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// (external_id, source_id) per document; index + 1 is the id
    pub documents: Vec<(String, String)>,
    /// content value per row; index + 1 is the id
    pub content: Vec<String>,
    pub symbols: Vec<NewSymbol>,
    pub geometries: Vec<Geometry>,
    pub geometry_links: Vec<GeometryLink>,
    pub matches: Vec<NewMatch>,
    pub child_links: Vec<ChildLink>,
    /// Storage calls issued, keyed by entity kind
    pub calls: HashMap<&'static str, usize>,
    /// When set, the named create operation fails on its next call
    pub fail_on: Option<&'static str>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named create operation (`"symbols"`, `"matches"`, ...) fail
    pub fn fail_on(mut self, step: &'static str) -> Self {
        self.fail_on = Some(step);
        self
    }

    /// Number of storage calls issued for an entity kind
    pub fn calls_for(&self, step: &'static str) -> usize {
        self.calls.get(step).copied().unwrap_or(0)
    }

    fn record_call(&mut self, step: &'static str) -> Result<()> {
        *self.calls.entry(step).or_insert(0) += 1;
        if self.fail_on == Some(step) {
            return Err(Error::Backend(format!("injected failure on {}", step)));
        }
        Ok(())
    }
}

impl SymbolStore for MemoryStore {
    fn upsert_document(&mut self, external_id: &str, source_id: &str) -> Result<i64> {
        self.record_call("documents")?;
        if let Some(pos) = self.documents.iter().position(|(e, _)| e == external_id) {
            return Ok(pos as i64 + 1);
        }
        self.documents.push((external_id.to_string(), source_id.to_string()));
        Ok(self.documents.len() as i64)
    }

    fn find_content(&mut self, content: &str) -> Result<Option<i64>> {
        Ok(self
            .content
            .iter()
            .position(|c| c == content)
            .map(|pos| pos as i64 + 1))
    }

    fn create_content(&mut self, rows: &[String]) -> Result<Vec<i64>> {
        self.record_call("canonical_content")?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            self.content.push(row.clone());
            ids.push(self.content.len() as i64);
        }
        Ok(ids)
    }

    fn create_symbols(&mut self, rows: &[NewSymbol]) -> Result<Vec<i64>> {
        self.record_call("symbols")?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            self.symbols.push(row.clone());
            ids.push(self.symbols.len() as i64);
        }
        Ok(ids)
    }

    fn create_geometries(&mut self, rows: &[Geometry]) -> Result<Vec<i64>> {
        self.record_call("geometries")?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            self.geometries.push(*row);
            ids.push(self.geometries.len() as i64);
        }
        Ok(ids)
    }

    fn create_geometry_links(&mut self, rows: &[GeometryLink]) -> Result<()> {
        self.record_call("geometry_links")?;
        self.geometry_links.extend_from_slice(rows);
        Ok(())
    }

    fn create_matches(&mut self, rows: &[NewMatch]) -> Result<()> {
        self.record_call("matches")?;
        self.matches.extend_from_slice(rows);
        Ok(())
    }

    fn create_child_links(&mut self, rows: &[ChildLink]) -> Result<()> {
        self.record_call("child_links")?;
        self.child_links.extend_from_slice(rows);
        Ok(())
    }
}
