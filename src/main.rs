//! # JMeter SLA Report - Main Entry Point
//!
//! 1. **Parse arguments** and install logging
//! 2. **Discover sources**: files and directories of JTL/CSV results
//! 3. **Aggregate**: each source on its own engine, merged in order
//! 4. **Report**: build the model and write HTML (and optionally JSON)
//!
//! A source that fails to parse aborts the run unless `--continue-on-error` is given, in
//! which case its partial data is discarded and the remaining sources are processed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use jmeter_sla_report::{
    cli::{Args, ReportConfig},
    ingest::{discover_sources, IngestRunner},
    logging::init_logging,
    results::{ReportModel, ResultsManager, SystemInfo},
    utils::{format_decimal, format_number, format_percent},
};
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_logging(args.verbose, args.log_file.as_deref())?;

    info!("Starting JMeter SLA Report {}", jmeter_sla_report::VERSION);
    tracing::debug!("Configuration: {:?}", args);

    let config = ReportConfig::from_args(&args)?;

    let sources = discover_sources(&config.sources)?;
    info!("Found {} source file(s)", sources.len());

    let runner = IngestRunner::new(sources, &config);
    let (engine, summary) = runner.run().context("Failed to aggregate results")?;

    if summary.failed_sources() > 0 {
        warn!(
            "{} of {} source(s) were skipped",
            summary.failed_sources(),
            summary.sources.len()
        );
    }
    if engine.is_empty() {
        bail!("No samples found in {:?}", config.sources);
    }

    let model = ReportModel::build(&engine, &summary, &config, SystemInfo::collect());
    ResultsManager::from_config(&config).finalize(&model)?;

    info!(
        "{} requests, {} failures, success rate {}, average {} ms",
        format_number(model.summary.requests),
        format_number(model.summary.failures),
        format_percent(model.summary.success_rate),
        format_decimal(model.summary.average_ms)
    );
    Ok(())
}
