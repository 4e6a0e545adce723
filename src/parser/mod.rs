//! Format adapters turning JMeter result files into [`Record`] streams.
//!
//! Each adapter is a lazy, forward-only iterator over `Result<Record, ParseError>`.
//! Nothing beyond the element or row currently being decoded is held in memory, so
//! sources may be far larger than RAM.

use crate::record::Record;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

pub mod csv;
pub mod xml;

pub use self::csv::CsvRecordSource;
pub use self::xml::XmlRecordSource;

/// Errors raised while decoding a result file
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("missing required field '{field}' at {position}")]
    MissingField {
        field: &'static str,
        position: String,
    },

    #[error("invalid value '{value}' for field '{field}' at {position}")]
    InvalidField {
        field: &'static str,
        value: String,
        position: String,
    },

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Concrete format of a result file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// JTL XML with `sample` / `httpSample` elements
    Xml,
    /// Delimited rows with a header line
    Csv,
}

impl SourceFormat {
    /// Guess the format from the file extension: `.csv` is CSV, everything else XML.
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => SourceFormat::Csv,
            _ => SourceFormat::Xml,
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Xml => write!(f, "XML"),
            SourceFormat::Csv => write!(f, "CSV"),
        }
    }
}

/// A record stream over either supported format
pub enum RecordSource<R: Read> {
    Xml(XmlRecordSource<BufReader<R>>),
    Csv(CsvRecordSource<R>),
}

impl<R: Read> RecordSource<R> {
    pub fn new(reader: R, format: SourceFormat) -> Result<Self, ParseError> {
        Ok(match format {
            SourceFormat::Xml => RecordSource::Xml(XmlRecordSource::new(BufReader::new(reader))),
            SourceFormat::Csv => RecordSource::Csv(CsvRecordSource::new(reader)?),
        })
    }
}

impl<R: Read> Iterator for RecordSource<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecordSource::Xml(source) => source.next(),
            RecordSource::Csv(source) => source.next(),
        }
    }
}

/// Open `path` as a record stream in the given format
pub fn open_source(path: &Path, format: SourceFormat) -> Result<RecordSource<File>, ParseError> {
    let file = File::open(path)?;
    RecordSource::new(file, format)
}

/// Parse a JMeter boolean: `true` in any case is true, anything else false.
pub(crate) fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

pub(crate) fn parse_u64(
    field: &'static str,
    value: &str,
    position: impl FnOnce() -> String,
) -> Result<u64, ParseError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidField {
            field,
            value: value.to_string(),
            position: position(),
        })
}

/// Parse epoch milliseconds into a UTC instant.
pub(crate) fn parse_epoch_millis(
    field: &'static str,
    value: &str,
    position: impl FnOnce() -> String,
) -> Result<DateTime<Utc>, ParseError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .ok_or_else(|| ParseError::InvalidField {
            field,
            value: value.to_string(),
            position: position(),
        })
}
