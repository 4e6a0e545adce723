use crate::parser::SourceFormat;
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// JMeter SLA Report - turn gigabytes of JMeter results into a compact HTML report
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// HTML report to write (parent directories are created)
    #[clap(help_heading = "Core Options")]
    pub output: PathBuf,

    /// JTL/CSV result files or directories containing them (default: current directory)
    #[clap(help_heading = "Core Options")]
    pub sources: Vec<PathBuf>,

    /// Input format; "auto" picks CSV for *.csv files and XML otherwise
    #[clap(short = 'f', long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,

    /// Also write the aggregated model as JSON
    #[clap(long)]
    pub json_output: Option<PathBuf>,

    /// Skip sources that fail to parse instead of aborting the run
    #[clap(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Number of sources aggregated in parallel
    #[clap(short = 'j', long, default_value_t = crate::defaults::JOBS)]
    pub jobs: usize,

    /// Column the per-label tables are sorted by
    #[clap(long, value_enum, default_value_t = SortColumn::FirstAccess)]
    pub sort: SortColumn,

    /// Sort in descending order
    #[clap(long, default_value_t = false)]
    pub descending: bool,

    /// Report title
    #[clap(long, default_value = crate::defaults::REPORT_TITLE)]
    pub title: String,

    /// Also write logs to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// Input format selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum InputFormat {
    /// Decide per file by extension
    #[clap(name = "auto")]
    Auto,

    /// JTL XML
    #[clap(name = "xml")]
    Xml,

    /// CSV with header row
    #[clap(name = "csv")]
    Csv,
}

impl InputFormat {
    /// Resolve the concrete format for `path`
    pub fn resolve(self, path: &Path) -> SourceFormat {
        match self {
            InputFormat::Auto => SourceFormat::detect(path),
            InputFormat::Xml => SourceFormat::Xml,
            InputFormat::Csv => SourceFormat::Csv,
        }
    }
}

/// Column used to order per-label tables
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum SortColumn {
    #[clap(name = "label")]
    Label,
    #[clap(name = "first-access")]
    FirstAccess,
    #[clap(name = "last-access")]
    LastAccess,
    #[clap(name = "requests")]
    Requests,
    #[clap(name = "average")]
    Average,
    #[clap(name = "max")]
    Max,
}

impl std::fmt::Display for SortColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortColumn::Label => write!(f, "Label"),
            SortColumn::FirstAccess => write!(f, "First Access"),
            SortColumn::LastAccess => write!(f, "Last Access"),
            SortColumn::Requests => write!(f, "Requests"),
            SortColumn::Average => write!(f, "Average"),
            SortColumn::Max => write!(f, "Max Time"),
        }
    }
}

/// Validated run configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output: PathBuf,
    pub sources: Vec<PathBuf>,
    pub format: InputFormat,
    pub json_output: Option<PathBuf>,
    pub continue_on_error: bool,
    pub jobs: usize,
    pub sort: SortColumn,
    pub descending: bool,
    pub title: String,
}

impl ReportConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.jobs == 0 {
            bail!("--jobs must be at least 1");
        }
        if args.title.trim().is_empty() {
            bail!("--title must not be empty");
        }

        // No sources means: pick up results from the working directory.
        let sources = if args.sources.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            args.sources.clone()
        };

        Ok(Self {
            output: args.output.clone(),
            sources,
            format: args.format,
            json_output: args.json_output.clone(),
            continue_on_error: args.continue_on_error,
            jobs: args.jobs,
            sort: args.sort,
            descending: args.descending,
            title: args.title.clone(),
        })
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(crate::defaults::OUTPUT_FILE),
            sources: vec![PathBuf::from(".")],
            format: InputFormat::Auto,
            json_output: None,
            continue_on_error: false,
            jobs: crate::defaults::JOBS,
            sort: SortColumn::FirstAccess,
            descending: false,
            title: crate::defaults::REPORT_TITLE.to_string(),
        }
    }
}
