//! Adapter for JMeter CSV result files.
//!
//! The first row must be a header naming the columns; column order is free. Only the
//! columns below are read, everything else JMeter writes (threadName, Latency, ...) is
//! ignored.

use super::{parse_bool, parse_epoch_millis, parse_u64, ParseError};
use crate::record::{Record, RecordBuilder};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::io::Read;

const TIME_STAMP: &str = "timeStamp";
const ELAPSED: &str = "elapsed";
const LABEL: &str = "label";
const RESPONSE_CODE: &str = "responseCode";
const RESPONSE_MESSAGE: &str = "responseMessage";
const SUCCESS: &str = "success";
const BYTES: &str = "bytes";

/// Timestamp layout JMeter writes when `jmeter.save.saveservice.timestamp_format` is set.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S,%3f";

#[derive(Debug, Clone, Copy)]
struct Columns {
    time_stamp: usize,
    elapsed: usize,
    label: usize,
    success: usize,
    response_code: Option<usize>,
    response_message: Option<usize>,
    bytes: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &::csv::StringRecord) -> Result<Self, ParseError> {
        let find = |name: &str| headers.iter().position(|header| header.trim() == name);
        let require = |name: &'static str| find(name).ok_or(ParseError::MissingColumn(name));

        Ok(Self {
            time_stamp: require(TIME_STAMP)?,
            elapsed: require(ELAPSED)?,
            label: require(LABEL)?,
            success: require(SUCCESS)?,
            response_code: find(RESPONSE_CODE),
            response_message: find(RESPONSE_MESSAGE),
            bytes: find(BYTES),
        })
    }
}

/// Lazy record stream over a CSV result file
pub struct CsvRecordSource<R: Read> {
    rows: ::csv::StringRecordsIntoIter<R>,
    columns: Columns,
    finished: bool,
}

impl<R: Read> CsvRecordSource<R> {
    /// Read the header row and prepare the row iterator.
    ///
    /// Fails with [`ParseError::MissingColumn`] when a required column is absent, which
    /// includes an empty input.
    pub fn new(input: R) -> Result<Self, ParseError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);
        let columns = Columns::from_headers(reader.headers()?)?;
        Ok(Self {
            rows: reader.into_records(),
            columns,
            finished: false,
        })
    }

    fn to_record(&self, row: &::csv::StringRecord) -> Result<Record, ParseError> {
        let position = || {
            row.position()
                .map_or_else(|| "unknown line".to_string(), |p| format!("line {}", p.line()))
        };
        let field = |name: &'static str, index: usize| {
            row.get(index).ok_or_else(|| ParseError::MissingField {
                field: name,
                position: position(),
            })
        };
        let optional = |index: Option<usize>| index.and_then(|i| row.get(i)).unwrap_or("");

        let timestamp = parse_timestamp(field(TIME_STAMP, self.columns.time_stamp)?, position)?;
        let duration = parse_u64(ELAPSED, field(ELAPSED, self.columns.elapsed)?, position)?;
        let label = field(LABEL, self.columns.label)?;
        let success = parse_bool(field(SUCCESS, self.columns.success)?);
        let bytes = match self.columns.bytes.and_then(|i| row.get(i)) {
            Some(value) if !value.trim().is_empty() => Some(parse_u64(BYTES, value, position)?),
            _ => None,
        };

        Ok(RecordBuilder::new(label, timestamp, duration)
            .success(success)
            .result_code(optional(self.columns.response_code))
            .response_message(optional(self.columns.response_message))
            .bytes_received(bytes)
            .build())
    }
}

impl<R: Read> Iterator for CsvRecordSource<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = match self.rows.next()? {
            Ok(row) => self.to_record(&row),
            Err(err) => Err(ParseError::from(err)),
        };
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// Parse either epoch milliseconds or [`TIMESTAMP_FORMAT`] in local time.
pub fn parse_timestamp(
    value: &str,
    position: impl FnOnce() -> String,
) -> Result<DateTime<Utc>, ParseError> {
    if !value.contains(':') {
        return parse_epoch_millis(TIME_STAMP, value, position);
    }
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ParseError::InvalidField {
            field: TIME_STAMP,
            value: value.to_string(),
            position: position(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "timeStamp,elapsed,label,responseCode,responseMessage,threadName,dataType,success,bytes,Latency\n";

    fn parse(csv: &str) -> Result<Vec<Record>, ParseError> {
        CsvRecordSource::new(csv.as_bytes())?.collect()
    }

    #[test]
    fn test_parses_rows() {
        let csv = format!(
            "{}{}{}",
            HEADER,
            "1301400114405,4,Home,200,OK,Group 1-1,text,true,2469,3\n",
            "1301400114500,800,Login,500,\"Internal, Server Error\",Group 1-1,text,false,120,700\n"
        );
        let records = parse(&csv).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].label, "Home");
        assert_eq!(records[0].duration_ms, 4);
        assert_eq!(records[0].bytes_received, Some(2469));
        assert_eq!(records[0].timestamp.timestamp_millis(), 1_301_400_114_405);
        assert!(records[0].success);

        assert!(!records[1].success);
        assert_eq!(records[1].result_code, "500");
        assert_eq!(records[1].response_message, "Internal, Server Error");
    }

    #[test]
    fn test_column_order_is_free() {
        let csv = "success,label,elapsed,timeStamp\ntrue,Search,17,1000\n";
        let records = parse(csv).unwrap();
        assert_eq!(records[0].label, "Search");
        assert_eq!(records[0].duration_ms, 17);
        assert_eq!(records[0].bytes_received, None);
        assert_eq!(records[0].result_code, "");
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(
            CsvRecordSource::new("".as_bytes()),
            Err(ParseError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_missing_required_column_fails() {
        let csv = "timeStamp,label,success\n1000,Home,true\n";
        assert!(matches!(
            CsvRecordSource::new(csv.as_bytes()),
            Err(ParseError::MissingColumn("elapsed"))
        ));
    }

    #[test]
    fn test_invalid_elapsed_fails_and_stops() {
        let csv = format!(
            "{}{}{}",
            HEADER,
            "1000,abc,Home,200,OK,t,text,true,1,1\n",
            "1001,5,Home,200,OK,t,text,true,1,1\n"
        );
        let mut source = CsvRecordSource::new(csv.as_bytes()).unwrap();
        assert!(matches!(
            source.next(),
            Some(Err(ParseError::InvalidField { field: "elapsed", .. }))
        ));
        assert!(source.next().is_none());
    }

    #[test]
    fn test_short_row_reports_missing_field() {
        let csv = "timeStamp,elapsed,label,success\n1000,5\n";
        assert!(matches!(
            parse(csv),
            Err(ParseError::MissingField { field: "label", .. })
        ));
    }

    #[test]
    fn test_formatted_timestamp_is_local_time() {
        let parsed = parse_timestamp("2011/03/29 14:01:54,405", || String::new()).unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!(
            local.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "2011-03-29 14:01:54.405"
        );
    }

    #[test]
    fn test_bad_timestamp_fails() {
        assert!(parse_timestamp("2011/03/29 25:99:00,000", String::new).is_err());
        assert!(parse_timestamp("soon", String::new).is_err());
    }
}
