//! Per-document pipeline - build the graph, then persist it
//!
//! Documents are independent: the runner fans them out over a rayon pool
//! and each worker opens its own connection to the database. Within a
//! document the steps are strictly sequential, since every later step
//! consumes ids produced by an earlier one. A failed document is reported
//! and the run continues; earlier writes for it are not retracted.

use std::path::{Path, PathBuf};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};
use crate::{Error, Result};
use crate::config::BatchSizes;
use crate::graph::SymbolGraph;
use crate::persister::{BatchPersister, PersistReport};
use crate::source::{self, DocumentInputs};
use crate::storage::{SqliteStore, SymbolStore};

/// Outcome tally for one run over a data directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    /// A run only counts as failed when every processed document failed
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.uploaded == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} uploaded, {} skipped, {} failed",
            self.uploaded, self.skipped, self.failed
        )
    }
}

/// Build and persist one document's graph through an already-open store.
pub fn process_document<S: SymbolStore + ?Sized>(
    store: &mut S,
    inputs: DocumentInputs,
    sizes: &BatchSizes,
) -> Result<PersistReport> {
    let mut graph = SymbolGraph::build(inputs.symbols)?;
    graph.attach_locations(inputs.boxes);
    graph.attach_matches(inputs.matches)?;
    debug!("built graph for {}:\n{}", inputs.source_id, graph.stats());

    BatchPersister::new(store, sizes.clone()).persist(
        &inputs.external_id,
        &inputs.source_id,
        &graph,
    )
}

enum Outcome {
    Uploaded,
    Skipped,
    Failed,
}

fn process_directory(dir: &Path, database: &Path, sizes: &BatchSizes) -> Outcome {
    let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("?");

    let inputs = match source::load_document(dir) {
        Ok(Some(inputs)) => inputs,
        Ok(None) => return Outcome::Skipped,
        Err(e) => {
            error!("failed to load inputs for {}: {}", name, e);
            return Outcome::Failed;
        }
    };

    let mut store = match SqliteStore::open(database) {
        Ok(store) => store,
        Err(e) => {
            error!("failed to open database for {}: {}", name, e);
            return Outcome::Failed;
        }
    };

    match process_document(&mut store, inputs, sizes) {
        Ok(report) => {
            info!("uploaded {}: {}", name, report);
            Outcome::Uploaded
        }
        Err(e) => {
            error!("failed to persist {}: {}", name, e);
            Outcome::Failed
        }
    }
}

/// Process every document directory under `data_dir`.
///
/// The schema must already be initialized; an unreachable database at
/// startup is fatal for the whole run, while per-document failures are
/// tallied and the run continues.
pub fn run(data_dir: &Path, database: &Path, jobs: usize, sizes: &BatchSizes) -> Result<RunSummary> {
    // Fail the run up front if the backend is unusable at all
    SqliteStore::open(database)?.stats()?;

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    if dirs.is_empty() {
        warn!("no document directories under {}", data_dir.display());
        return Ok(RunSummary::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::Backend(e.to_string()))?;

    let outcomes: Vec<Outcome> = pool.install(|| {
        dirs.par_iter()
            .map(|dir| process_directory(dir, database, sizes))
            .collect()
    });

    let mut summary = RunSummary::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Uploaded => summary.uploaded += 1,
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }
    Ok(summary)
}
