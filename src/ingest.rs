//! # Source Ingestion
//!
//! Resolves the configured sources into result files and drives them through the
//! aggregation engine.
//!
//! Every file is aggregated on its own [`AggregationEngine`]. A file that parses to the
//! end is merged into the run's engine in source order; a file that fails is dropped
//! as a whole, and the run either aborts or moves on to the next file depending on
//! `continue_on_error`. With more than one job, files are aggregated on a rayon pool
//! and merged afterwards, which yields the same result as the sequential path.

use crate::cli::{InputFormat, ReportConfig};
use crate::engine::AggregationEngine;
use crate::parser::{open_source, ParseError, SourceFormat};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no source files found in {0:?}")]
    NoSources(Vec<PathBuf>),

    #[error("the following JMeter result file was not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to list directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Outcome of a single source
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub records: u64,
    pub error: Option<String>,
}

/// Outcome of all sources of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub sources: Vec<SourceReport>,
    pub records: u64,
    pub elapsed_ms: u128,
}

impl IngestSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Expand directories into their `*.jtl` and `*.csv` files.
///
/// Files are taken as given; directory listings are sorted by file name so runs are
/// reproducible.
pub fn discover_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut result = Vec::new();

    for path in paths {
        if path.is_file() {
            result.push(path.clone());
        } else if path.is_dir() {
            let listing = std::fs::read_dir(path).map_err(|source| IngestError::Directory {
                path: path.clone(),
                source,
            })?;
            let mut found: Vec<PathBuf> = listing
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|candidate| candidate.is_file() && is_result_file(candidate))
                .collect();
            found.sort();
            debug!("Found {} result file(s) in {:?}", found.len(), path);
            result.extend(found);
        } else {
            return Err(IngestError::SourceNotFound(path.clone()));
        }
    }

    if result.is_empty() {
        return Err(IngestError::NoSources(paths.to_vec()));
    }
    Ok(result)
}

fn is_result_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jtl") || ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Aggregate one file on a fresh engine.
pub fn aggregate_file(path: &Path, format: SourceFormat) -> Result<AggregationEngine, ParseError> {
    let started = Instant::now();
    let engine = AggregationEngine::aggregate_source(open_source(path, format)?)?;
    debug!(
        "Aggregated {} record(s) from {:?} in {:?}",
        engine.records(),
        path,
        started.elapsed()
    );
    Ok(engine)
}

/// Drives configured sources into a single engine
pub struct IngestRunner {
    sources: Vec<PathBuf>,
    format: InputFormat,
    continue_on_error: bool,
    jobs: usize,
}

impl IngestRunner {
    pub fn new(sources: Vec<PathBuf>, config: &ReportConfig) -> Self {
        Self {
            sources,
            format: config.format,
            continue_on_error: config.continue_on_error,
            jobs: config.jobs,
        }
    }

    /// Aggregate every source and merge the results in source order.
    pub fn run(&self) -> Result<(AggregationEngine, IngestSummary), IngestError> {
        let started = Instant::now();
        let mut engine = AggregationEngine::new();
        let mut summary = IngestSummary::default();

        if self.jobs > 1 && self.sources.len() > 1 {
            info!(
                "Aggregating {} sources with {} jobs",
                self.sources.len(),
                self.jobs
            );
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()?;
            let outcomes: Vec<_> = pool.install(|| {
                self.sources
                    .par_iter()
                    .map(|path| {
                        let format = self.format.resolve(path);
                        (path, format, aggregate_file(path, format))
                    })
                    .collect()
            });
            for (path, format, outcome) in outcomes {
                self.absorb(&mut engine, &mut summary, path, format, outcome)?;
            }
        } else {
            for path in &self.sources {
                let format = self.format.resolve(path);
                info!("Processing {:?} as {}", path, format);
                let outcome = aggregate_file(path, format);
                self.absorb(&mut engine, &mut summary, path, format, outcome)?;
            }
        }

        summary.records = engine.records();
        summary.elapsed_ms = started.elapsed().as_millis();
        info!(
            "Aggregated {} record(s) from {} source(s) in {} ms",
            summary.records,
            summary.sources.len() - summary.failed_sources(),
            summary.elapsed_ms
        );
        Ok((engine, summary))
    }

    fn absorb(
        &self,
        engine: &mut AggregationEngine,
        summary: &mut IngestSummary,
        path: &Path,
        format: SourceFormat,
        outcome: Result<AggregationEngine, ParseError>,
    ) -> Result<(), IngestError> {
        match outcome {
            Ok(partial) => {
                summary.sources.push(SourceReport {
                    path: path.to_path_buf(),
                    format,
                    records: partial.records(),
                    error: None,
                });
                engine.merge(partial);
                Ok(())
            }
            Err(source) => {
                error!("Failed to parse {:?}: {}", path, source);
                if !self.continue_on_error {
                    return Err(IngestError::Source {
                        path: path.to_path_buf(),
                        source,
                    });
                }
                warn!("Skipping {:?}, continuing with the next source", path);
                summary.sources.push(SourceReport {
                    path: path.to_path_buf(),
                    format,
                    records: 0,
                    error: Some(source.to_string()),
                });
                Ok(())
            }
        }
    }
}
