//! Input loaders - per-document files produced by the upstream pipeline
//!
//! One directory per document bundle:
//! - `metadata.json` with the resolved external document id
//! - `symbols.csv` from the extractor (key, parent key, MathML)
//! - `symbol_locations.csv` from the locator (key, page, box)
//! - `matches.csv` from the matcher, ordered by intended rank
//!
//! All csv files are headerless. A document missing any of these is
//! skippable: the loader reports it and the run moves on.

use std::collections::HashMap;
use std::path::Path;
use serde::Deserialize;
use tracing::warn;
use crate::{Error, Result};
use crate::key::SymbolKey;
use crate::symbol::{Geometry, MatchCandidate, SymbolRecord};

/// Everything needed to build and persist one document's graph.
#[derive(Debug)]
pub struct DocumentInputs {
    /// Bundle directory name (e.g. an arXiv id)
    pub source_id: String,
    /// Resolved external document identifier
    pub external_id: String,
    pub symbols: Vec<SymbolRecord>,
    pub boxes: HashMap<SymbolKey, Geometry>,
    pub matches: HashMap<SymbolKey, Vec<MatchCandidate>>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    external_id: String,
}

#[derive(Debug, Deserialize)]
struct SymbolRow {
    tex_path: String,
    equation_index: i32,
    token_index: i32,
    parent_tex_path: Option<String>,
    parent_equation_index: Option<i32>,
    parent_token_index: Option<i32>,
    mathml: String,
}

#[derive(Debug, Deserialize)]
struct LocationRow {
    tex_path: String,
    equation_index: i32,
    token_index: i32,
    page: i32,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

/// Match rows carry an unused field between the source and target keys,
/// kept so existing matcher output loads unchanged.
#[derive(Debug, Deserialize)]
struct MatchRow {
    tex_path: String,
    equation_index: i32,
    token_index: i32,
    #[allow(dead_code)]
    confidence: Option<f64>,
    target_tex_path: String,
    target_equation_index: i32,
    target_token_index: i32,
    mathml: String,
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(Into::into)
}

/// Load the extractor's symbol records
pub fn load_symbols(path: &Path) -> Result<Vec<SymbolRecord>> {
    let mut records = Vec::new();
    for row in csv_reader(path)?.deserialize() {
        let row: SymbolRow = row?;
        let key = SymbolKey::new(row.tex_path, row.equation_index, row.token_index);
        let parent = match (
            row.parent_tex_path,
            row.parent_equation_index,
            row.parent_token_index,
        ) {
            (Some(tex), Some(eq), Some(token)) => Some(SymbolKey::new(tex, eq, token)),
            (None, None, None) => None,
            _ => {
                return Err(Error::InvalidKey(format!(
                    "partial parent key for symbol {}",
                    key
                )));
            }
        };
        records.push(SymbolRecord {
            key,
            mathml: row.mathml,
            parent,
        });
    }
    Ok(records)
}

/// Load the locator's bounding boxes, keyed by structural identity
pub fn load_locations(path: &Path) -> Result<HashMap<SymbolKey, Geometry>> {
    let mut boxes = HashMap::new();
    for row in csv_reader(path)?.deserialize() {
        let row: LocationRow = row?;
        boxes.insert(
            SymbolKey::new(row.tex_path, row.equation_index, row.token_index),
            Geometry {
                page: row.page,
                left: row.left,
                top: row.top,
                width: row.width,
                height: row.height,
            },
        );
    }
    Ok(boxes)
}

/// Load match candidates grouped by source key.
///
/// File order within each source is preserved; that order is the rank.
pub fn load_matches(path: &Path) -> Result<HashMap<SymbolKey, Vec<MatchCandidate>>> {
    let mut matches: HashMap<SymbolKey, Vec<MatchCandidate>> = HashMap::new();
    for row in csv_reader(path)?.deserialize() {
        let row: MatchRow = row?;
        let source = SymbolKey::new(row.tex_path, row.equation_index, row.token_index);
        let target = SymbolKey::new(
            row.target_tex_path,
            row.target_equation_index,
            row.target_token_index,
        );
        matches
            .entry(source)
            .or_default()
            .push(MatchCandidate::new(target, row.mathml));
    }
    Ok(matches)
}

/// Load one document directory.
///
/// Returns `Ok(None)` when the document is skippable: no resolvable
/// external id, or any of the three input files missing.
pub fn load_document(dir: &Path) -> Result<Option<DocumentInputs>> {
    let source_id = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let metadata_path = dir.join("metadata.json");
    if !metadata_path.exists() {
        warn!("no metadata.json for {}, skipping", source_id);
        return Ok(None);
    }
    let metadata: Metadata = serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)?;

    let symbols_path = dir.join("symbols.csv");
    if !symbols_path.exists() {
        warn!("no symbols.csv for {}, skipping", source_id);
        return Ok(None);
    }

    let locations_path = dir.join("symbol_locations.csv");
    if !locations_path.exists() {
        warn!("could not find bounding box information for {}, skipping", source_id);
        return Ok(None);
    }

    let matches_path = dir.join("matches.csv");
    if !matches_path.exists() {
        warn!("could not find symbol match information for {}, skipping", source_id);
        return Ok(None);
    }

    Ok(Some(DocumentInputs {
        source_id,
        external_id: metadata.external_id,
        symbols: load_symbols(&symbols_path)?,
        boxes: load_locations(&locations_path)?,
        matches: load_matches(&matches_path)?,
    }))
}
