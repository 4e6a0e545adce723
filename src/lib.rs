//! # JMeter SLA Report Library
//!
//! Turns JMeter result files (JTL XML or CSV) of arbitrary size into a compact HTML
//! report with per-label response time statistics, response time distributions, and
//! bounded samples of error detail.
//!
//! ## Architecture Overview
//!
//! - `record`: the canonical request outcome produced by the format adapters
//! - `parser`: streaming XML and CSV adapters yielding `Result<Record, ParseError>`
//! - `histogram`, `metrics`, `registry`, `error_cache`: the aggregate state
//! - `engine`: single-pass aggregation and failure classification
//! - `ingest`: source discovery and per-file aggregation, optionally in parallel
//! - `results`, `report`: the report model, HTML rendering, and output files
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use jmeter_sla_report::{open_source, AggregationEngine, SourceFormat};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = open_source(Path::new("results.jtl"), SourceFormat::Xml)?;
//!     let engine = AggregationEngine::aggregate_source(source)?;
//!
//!     if let Some(home) = engine.duration_monitor("Home") {
//!         println!("Home: {} requests, {:.2} ms average", home.hits(), home.mean());
//!     }
//!     Ok(())
//! }
//! ```

/// Command-line interface and run configuration
pub mod cli;

/// Single-pass aggregation of record streams
pub mod engine;

pub mod error_cache;

pub mod histogram;

/// Source discovery and orchestration across files
pub mod ingest;

pub mod logging;

/// Per-(label, unit) running statistics
pub mod metrics;

/// Streaming adapters for JTL XML and CSV result files
pub mod parser;

pub mod record;

pub mod registry;

/// HTML rendering of the report model
pub mod report;

/// Report model, host metadata, and output handling
pub mod results;

pub mod utils;

pub use cli::{Args, InputFormat, ReportConfig, SortColumn};
pub use engine::AggregationEngine;
pub use error_cache::{ErrorCache, ErrorEntry};
pub use histogram::Histogram;
pub use ingest::{IngestError, IngestRunner, IngestSummary};
pub use metrics::{LabelMonitor, Unit, UNIT_EXCEPTION, UNIT_JMETER_ERRORS, UNIT_KB, UNIT_MS};
pub use parser::{open_source, ParseError, RecordSource, SourceFormat};
pub use record::{Record, RecordBuilder};
pub use registry::MonitorRegistry;
pub use results::{ReportModel, ResultsManager, SystemInfo};

/// The current version of the report generator
///
/// Populated from Cargo.toml and shown in the report properties.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Sources are aggregated one after another unless `--jobs` says otherwise.
    pub const JOBS: usize = 1;

    pub const REPORT_TITLE: &str = "Load Test Report";

    pub const OUTPUT_FILE: &str = "report.html";
}
