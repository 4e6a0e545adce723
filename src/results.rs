//! Report model derived from the aggregated state, and the writer that puts it on disk.
//!
//! [`ReportModel::build`] is a pure function of the engine, the ingest summary and the
//! configuration. Every table the HTML report shows is computed here once, sorted per
//! [`SortColumn`], so the renderer only has to walk rows.

use crate::cli::{ReportConfig, SortColumn};
use crate::engine::AggregationEngine;
use crate::histogram::MS_LAYOUT;
use crate::ingest::IngestSummary;
use crate::metrics::{LabelMonitor, UNIT_EXCEPTION, UNIT_JMETER_ERRORS, UNIT_KB, UNIT_MS};
use crate::report::HtmlReportWriter;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Host metadata shown in the report properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub host_name: String,
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub user_name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl SystemInfo {
    /// Collect metadata about the machine generating the report
    pub fn collect() -> Self {
        Self {
            host_name: host_name(),
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
            user_name: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            version: crate::VERSION.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(unix)]
fn host_name() -> String {
    nix::unistd::gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(not(unix))]
fn host_name() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".to_string())
}

/// Totals across all labels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub requests: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub first_request: Option<DateTime<Utc>>,
    pub last_request: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    /// Requests per second over the observed window, absent for a zero-length window
    pub throughput: Option<f64>,
}

/// One row of the pages overview table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRow {
    pub label: String,
    pub requests: u64,
    pub average_ms: f64,
    pub total_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub first_access: Option<DateTime<Utc>>,
    pub last_access: Option<DateTime<Utc>>,
    pub failures: u64,
    pub average_kb: Option<f64>,
}

/// One row of the pages detail table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramRow {
    pub label: String,
    pub requests: u64,
    pub buckets: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummaryRow {
    pub label: String,
    pub errors: u64,
}

/// Statistics of failed requests per error label (`label - code`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetailRow {
    pub error_label: String,
    pub errors: u64,
    pub average_ms: f64,
    pub max_ms: f64,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessageRow {
    pub label: String,
    pub error_label: String,
    pub error_code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the report shows
#[derive(Debug, Clone, Serialize)]
pub struct ReportModel {
    pub title: String,
    pub summary: ReportSummary,
    pub pages: Vec<LabelRow>,
    pub histogram_header: Vec<&'static str>,
    pub histograms: Vec<HistogramRow>,
    pub error_summary: Vec<ErrorSummaryRow>,
    pub error_details: Vec<ErrorDetailRow>,
    pub error_messages: Vec<ErrorMessageRow>,
    pub sources: IngestSummary,
    pub system_info: SystemInfo,
    pub sort: SortColumn,
    pub descending: bool,
}

impl ReportModel {
    pub fn build(
        engine: &AggregationEngine,
        sources: &IngestSummary,
        config: &ReportConfig,
        system_info: SystemInfo,
    ) -> Self {
        let registry = engine.registry();

        let mut pages: Vec<LabelRow> = registry
            .by_unit(UNIT_MS)
            .map(|monitor| {
                let failures = registry
                    .get(&monitor.label, UNIT_EXCEPTION)
                    .map_or(0, |m| m.total().round() as u64);
                let average_kb = registry.get(&monitor.label, UNIT_KB).map(|m| m.mean());
                label_row(monitor, failures, average_kb)
            })
            .collect();
        sort_rows(&mut pages, config.sort, config.descending, |row| SortKey {
            label: &row.label,
            first: row.first_access,
            last: row.last_access,
            requests: row.requests,
            average: row.average_ms,
            max: row.max_ms,
        });

        let histograms = pages
            .iter()
            .filter_map(|row| registry.get(&row.label, UNIT_MS))
            .map(|monitor| HistogramRow {
                label: monitor.label.clone(),
                requests: monitor.hits(),
                buckets: monitor.histogram.counts().to_vec(),
            })
            .collect();

        let mut error_summary: Vec<ErrorSummaryRow> = pages
            .iter()
            .filter(|row| row.failures > 0)
            .map(|row| ErrorSummaryRow {
                label: row.label.clone(),
                errors: row.failures,
            })
            .collect();
        error_summary.sort_by(|a, b| b.errors.cmp(&a.errors).then_with(|| a.label.cmp(&b.label)));

        let mut error_details: Vec<ErrorDetailRow> = registry
            .by_unit(UNIT_JMETER_ERRORS)
            .map(|monitor| ErrorDetailRow {
                error_label: monitor.label.clone(),
                errors: monitor.hits(),
                average_ms: monitor.mean(),
                max_ms: monitor.max_value().unwrap_or(0.0),
                first: monitor.first_seen,
                last: monitor.last_seen,
            })
            .collect();
        sort_rows(&mut error_details, config.sort, config.descending, |row| {
            SortKey {
                label: &row.error_label,
                first: row.first,
                last: row.last,
                requests: row.errors,
                average: row.average_ms,
                max: row.max_ms,
            }
        });

        let error_messages = engine
            .errors()
            .entries()
            .map(|entry| ErrorMessageRow {
                label: entry.label.clone(),
                error_label: entry.error_label.clone(),
                error_code: entry.error_code.clone(),
                message: entry.error_message.clone(),
                timestamp: entry.timestamp,
            })
            .collect();

        let summary = summarize(engine, &pages);
        debug!(
            "Report model: {} label(s), {} error label(s)",
            pages.len(),
            error_details.len()
        );

        Self {
            title: config.title.clone(),
            summary,
            pages,
            histogram_header: MS_LAYOUT.labels().collect(),
            histograms,
            error_summary,
            error_details,
            error_messages,
            sources: sources.clone(),
            system_info,
            sort: config.sort,
            descending: config.descending,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failures > 0
    }

    /// Key/value pairs of the report properties table
    pub fn properties(&self) -> Vec<(String, String)> {
        let info = &self.system_info;
        let mut properties = vec![
            ("report.title".to_string(), self.title.clone()),
            (
                "report.created".to_string(),
                crate::utils::format_time(&info.created_at),
            ),
            (
                "report.sort".to_string(),
                format!(
                    "{} ({})",
                    self.sort,
                    if self.descending { "desc" } else { "asc" }
                ),
            ),
            ("host.name".to_string(), info.host_name.clone()),
            ("os.name".to_string(), info.os.clone()),
            ("os.arch".to_string(), info.architecture.clone()),
            ("cpu.cores".to_string(), info.cpu_cores.to_string()),
            ("user.name".to_string(), info.user_name.clone()),
            ("tool.version".to_string(), info.version.clone()),
            (
                "ingest.records".to_string(),
                self.sources.records.to_string(),
            ),
            (
                "ingest.elapsed".to_string(),
                format!("{} ms", self.sources.elapsed_ms),
            ),
        ];
        for (index, source) in self.sources.sources.iter().enumerate() {
            let value = match &source.error {
                None => format!(
                    "{} ({}, {} records)",
                    source.path.display(),
                    source.format,
                    source.records
                ),
                Some(error) => format!("{} (skipped: {})", source.path.display(), error),
            };
            properties.push((format!("ingest.source.{}", index + 1), value));
        }
        properties
    }
}

fn label_row(monitor: &LabelMonitor, failures: u64, average_kb: Option<f64>) -> LabelRow {
    LabelRow {
        label: monitor.label.clone(),
        requests: monitor.hits(),
        average_ms: monitor.mean(),
        total_ms: monitor.total(),
        std_dev_ms: monitor.std_dev(),
        min_ms: monitor.min_value().unwrap_or(0.0),
        max_ms: monitor.max_value().unwrap_or(0.0),
        first_access: monitor.first_seen,
        last_access: monitor.last_seen,
        failures,
        average_kb,
    }
}

fn summarize(engine: &AggregationEngine, pages: &[LabelRow]) -> ReportSummary {
    let requests: u64 = pages.iter().map(|row| row.requests).sum();
    let failures: u64 = pages.iter().map(|row| row.failures).sum();
    let total_ms: f64 = pages.iter().map(|row| row.total_ms).sum();
    debug_assert_eq!(requests, engine.records());

    let first_request = pages.iter().filter_map(|row| row.first_access).min();
    let last_request = pages.iter().filter_map(|row| row.last_access).max();
    let duration_ms = match (first_request, last_request) {
        (Some(first), Some(last)) => (last - first).num_milliseconds(),
        _ => 0,
    };

    let (success_rate, average_ms) = if requests == 0 {
        (100.0, 0.0)
    } else {
        (
            100.0 - failures as f64 * 100.0 / requests as f64,
            total_ms / requests as f64,
        )
    };

    ReportSummary {
        requests,
        failures,
        success_rate,
        average_ms,
        min_ms: pages.iter().map(|row| row.min_ms).reduce(f64::min).unwrap_or(0.0),
        max_ms: pages.iter().map(|row| row.max_ms).reduce(f64::max).unwrap_or(0.0),
        first_request,
        last_request,
        duration_ms,
        throughput: (duration_ms > 0).then(|| requests as f64 * 1000.0 / duration_ms as f64),
    }
}

struct SortKey<'a> {
    label: &'a str,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    requests: u64,
    average: f64,
    max: f64,
}

impl SortKey<'_> {
    fn compare(&self, other: &Self, column: SortColumn) -> Ordering {
        let primary = match column {
            SortColumn::Label => Ordering::Equal,
            SortColumn::FirstAccess => self.first.cmp(&other.first),
            SortColumn::LastAccess => self.last.cmp(&other.last),
            SortColumn::Requests => self.requests.cmp(&other.requests),
            SortColumn::Average => self.average.total_cmp(&other.average),
            SortColumn::Max => self.max.total_cmp(&other.max),
        };
        primary.then_with(|| self.label.cmp(other.label))
    }
}

fn sort_rows<T>(
    rows: &mut [T],
    column: SortColumn,
    descending: bool,
    key: impl for<'a> Fn(&'a T) -> SortKey<'a>,
) {
    rows.sort_by(|a, b| {
        let ordering = key(a).compare(&key(b), column);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Writes the rendered report and the optional JSON model
pub struct ResultsManager {
    output_file: PathBuf,
    json_output: Option<PathBuf>,
}

impl ResultsManager {
    pub fn new(output_file: &Path, json_output: Option<&Path>) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
            json_output: json_output.map(Path::to_path_buf),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(&config.output, config.json_output.as_deref())
    }

    /// Write every configured output
    pub fn finalize(&self, model: &ReportModel) -> Result<()> {
        self.write_html(model)?;
        info!("Report written to: {:?}", self.output_file);

        if let Some(ref json_output) = self.json_output {
            self.write_json(json_output, model)?;
            info!("JSON model written to: {:?}", json_output);
        }
        Ok(())
    }

    fn write_html(&self, model: &ReportModel) -> Result<()> {
        let mut out = create_output(&self.output_file)?;
        HtmlReportWriter::new(&mut out, model)
            .write()
            .with_context(|| format!("Failed to render report {:?}", self.output_file))?;
        out.flush()
            .with_context(|| format!("Failed to write report {:?}", self.output_file))?;
        Ok(())
    }

    fn write_json(&self, path: &Path, model: &ReportModel) -> Result<()> {
        let mut out = create_output(path)?;
        serde_json::to_writer_pretty(&mut out, model)
            .with_context(|| format!("Failed to serialize report model to {:?}", path))?;
        out.flush()
            .with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    Ok(BufWriter::new(file))
}
