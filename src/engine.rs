//! # Aggregation Engine
//!
//! Folds a stream of [`Record`]s into a [`MonitorRegistry`] and an [`ErrorCache`] in a
//! single forward pass. Records are never retained; memory use grows with the number
//! of distinct labels, not with the size of the input.
//!
//! ## Per-record processing
//!
//! 1. The response time is folded into the label's `UNIT_MS` monitor.
//! 2. When the source provided a byte count, `bytes / 1024` is folded into the label's
//!    `UNIT_KB` monitor.
//! 3. Failed records are classified (first assertion failure wins over the raw result
//!    code), counted under `UNIT_JMETER_ERRORS` by error label and under
//!    `UNIT_EXCEPTION` by original label, and sampled into the error cache when they
//!    carry a message.
//!
//! ## Failure model
//!
//! The engine itself never fails. A source that cannot produce a record aborts that
//! source: [`AggregationEngine::aggregate_source`] drops the partially filled engine and
//! hands the adapter's error back to the caller, who decides whether the run continues.

use crate::error_cache::{ErrorCache, ErrorEntry};
use crate::metrics::{LabelMonitor, UNIT_EXCEPTION, UNIT_JMETER_ERRORS, UNIT_KB, UNIT_MS};
use crate::record::Record;
use crate::registry::MonitorRegistry;
use serde::Serialize;
use tracing::trace;

/// Separator between label and result code in an error label
pub const ERROR_LABEL_SEPARATOR: &str = " - ";

/// The descriptive key of a failed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification<'a> {
    pub result_code: &'a str,
    pub response_message: &'a str,
}

impl<'a> Classification<'a> {
    /// Classify a failed record.
    ///
    /// The first assertion failure, when present, replaces the record's own result
    /// code and response message.
    pub fn of(record: &'a Record) -> Self {
        match record.assertion_failures.first() {
            Some(failure) => Self {
                result_code: &failure.name,
                response_message: &failure.message,
            },
            None => Self {
                result_code: &record.result_code,
                response_message: &record.response_message,
            },
        }
    }

    /// `label` alone when there is no result code, `label - code` otherwise.
    pub fn error_label(&self, label: &str) -> String {
        if self.result_code.is_empty() {
            label.to_string()
        } else {
            format!("{}{}{}", label, ERROR_LABEL_SEPARATOR, self.result_code)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationEngine {
    registry: MonitorRegistry,
    errors: ErrorCache,
    records: u64,
    failures: u64,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a single record into the aggregate state.
    pub fn ingest(&mut self, record: &Record) {
        self.records += 1;
        let duration = record.duration_ms as f64;

        self.registry
            .get_or_create(&record.label, UNIT_MS)
            .update(record.timestamp, duration);

        if let Some(bytes) = record.bytes_received {
            self.registry
                .get_or_create(&record.label, UNIT_KB)
                .update(record.timestamp, bytes as f64 / 1024.0);
        }

        if record.success {
            return;
        }

        self.failures += 1;
        let classification = Classification::of(record);
        let error_label = classification.error_label(&record.label);
        trace!(label = %record.label, error_label = %error_label, "failed sample");

        self.registry
            .get_or_create(&error_label, UNIT_JMETER_ERRORS)
            .update(record.timestamp, duration);
        self.registry
            .get_or_create(&record.label, UNIT_EXCEPTION)
            .update(record.timestamp, 1.0);

        if !classification.response_message.is_empty() {
            self.errors.record(
                &record.label,
                ErrorEntry {
                    label: record.label.clone(),
                    error_label,
                    error_code: classification.result_code.to_string(),
                    error_message: classification.response_message.to_string(),
                    timestamp: record.timestamp,
                },
            );
        }
    }

    /// Consume a record source to its end.
    ///
    /// Stops at the first error and returns it; records ingested before the error stay
    /// in `self`. Use [`AggregationEngine::aggregate_source`] to get all-or-nothing
    /// semantics for a single source.
    pub fn ingest_source<I, E>(&mut self, source: I) -> Result<u64, E>
    where
        I: IntoIterator<Item = Result<Record, E>>,
    {
        let mut ingested = 0;
        for record in source {
            self.ingest(&record?);
            ingested += 1;
        }
        Ok(ingested)
    }

    /// Aggregate one source on a fresh engine.
    ///
    /// On error the partial state is dropped; nothing of the failed source survives.
    pub fn aggregate_source<I, E>(source: I) -> Result<Self, E>
    where
        I: IntoIterator<Item = Result<Record, E>>,
    {
        let mut engine = Self::new();
        engine.ingest_source(source)?;
        Ok(engine)
    }

    /// Fold an engine built from later records into this one.
    pub fn merge(&mut self, other: AggregationEngine) {
        self.records += other.records;
        self.failures += other.failures;
        self.registry.merge(other.registry);
        self.errors.merge(other.errors);
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn errors(&self) -> &ErrorCache {
        &self.errors
    }

    /// Number of records ingested so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Number of failed records ingested so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Shorthand for the duration monitor of `label`.
    pub fn duration_monitor(&self, label: &str) -> Option<&LabelMonitor> {
        self.registry.get(label, UNIT_MS)
    }
}
