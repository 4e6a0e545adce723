//! Streaming adapter for JTL XML result files.
//!
//! ```xml
//! <testResults version="1.2">
//!   <httpSample t="4" ts="1301400114405" s="true" lb="Reporting.EnumGroupReport" rc="200" rm="OK" by="2469"/>
//!   <httpSample t="93" ts="1301400114410" s="false" lb="Login" rc="200" rm="OK">
//!     <assertionResult>
//!       <name>Response Assertion</name>
//!       <failure>true</failure>
//!       <error>false</error>
//!       <failureMessage>Test failed: text expected to contain /Welcome/</failureMessage>
//!     </assertionResult>
//!   </httpSample>
//! </testResults>
//! ```
//!
//! Samples may nest (transaction controllers); every `sample` / `httpSample` element
//! yields one record when it closes. Assertion results attach to the innermost open
//! sample.

use super::{parse_bool, parse_epoch_millis, parse_u64, ParseError};
use crate::record::{Record, RecordBuilder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use tracing::{debug, warn};

const SAMPLE: &[u8] = b"sample";
const HTTP_SAMPLE: &[u8] = b"httpSample";
const ASSERTION_RESULT: &[u8] = b"assertionResult";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssertionField {
    Name,
    Failure,
    Error,
    FailureMessage,
}

impl AssertionField {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"name" => Some(Self::Name),
            b"failure" => Some(Self::Failure),
            b"error" => Some(Self::Error),
            b"failureMessage" => Some(Self::FailureMessage),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PendingAssertion {
    name: String,
    failure: String,
    error: String,
    failure_message: String,
    field: Option<AssertionField>,
}

impl PendingAssertion {
    fn append(&mut self, text: &str) {
        let target = match self.field {
            Some(AssertionField::Name) => &mut self.name,
            Some(AssertionField::Failure) => &mut self.failure,
            Some(AssertionField::Error) => &mut self.error,
            Some(AssertionField::FailureMessage) => &mut self.failure_message,
            None => return,
        };
        target.push_str(text);
    }

    fn failed(&self) -> bool {
        parse_bool(&self.failure) || parse_bool(&self.error)
    }
}

/// Lazy record stream over a JTL XML document
pub struct XmlRecordSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open_samples: Vec<RecordBuilder>,
    assertion: Option<PendingAssertion>,
    finished: bool,
}

impl<R: BufRead> XmlRecordSource<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(1024),
            open_samples: Vec::new(),
            assertion: None,
            finished: false,
        }
    }

    fn position(&self) -> String {
        format!("byte {}", self.reader.buffer_position())
    }

    fn sample_builder(&self, element: &BytesStart<'_>) -> Result<RecordBuilder, ParseError> {
        let mut duration = None;
        let mut timestamp = None;
        let mut label = String::new();
        let mut result_code = String::new();
        let mut response_message = String::new();
        let mut success = false;
        let mut bytes = None;

        for attribute in element.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let value = attribute.unescape_value()?;
            match attribute.key.local_name().as_ref() {
                b"t" => duration = Some(parse_u64("t", &value, || self.position())?),
                b"ts" => timestamp = Some(parse_epoch_millis("ts", &value, || self.position())?),
                b"lb" => label = value.into_owned(),
                b"rc" => result_code = value.into_owned(),
                b"rm" => response_message = value.into_owned(),
                b"s" => success = parse_bool(&value),
                b"by" => bytes = Some(parse_u64("by", &value, || self.position())?),
                _ => {}
            }
        }

        let duration = duration.ok_or_else(|| ParseError::MissingField {
            field: "t",
            position: self.position(),
        })?;
        let timestamp = timestamp.ok_or_else(|| ParseError::MissingField {
            field: "ts",
            position: self.position(),
        })?;

        Ok(RecordBuilder::new(label, timestamp, duration)
            .success(success)
            .result_code(result_code)
            .response_message(response_message)
            .bytes_received(bytes))
    }

    fn close_assertion(&mut self) {
        let Some(assertion) = self.assertion.take() else {
            return;
        };
        if !assertion.failed() {
            return;
        }
        match self.open_samples.last_mut() {
            Some(sample) => sample.push_assertion_failure(assertion.name, assertion.failure_message),
            None => debug!("assertionResult outside of a sample, ignoring"),
        }
    }

    /// Handle one event; returns a record when a sample element completed.
    fn handle(&mut self, event: Event<'_>) -> Result<Option<Record>, ParseError> {
        match event {
            Event::Start(element) => {
                let name = element.local_name();
                let tag = name.as_ref();
                if tag == SAMPLE || tag == HTTP_SAMPLE {
                    let builder = self.sample_builder(&element)?;
                    self.open_samples.push(builder);
                } else if tag == ASSERTION_RESULT {
                    self.assertion = Some(PendingAssertion::default());
                } else if let Some(assertion) = self.assertion.as_mut() {
                    assertion.field = AssertionField::from_tag(tag);
                }
                Ok(None)
            }
            Event::Empty(element) => {
                let name = element.local_name();
                let tag = name.as_ref();
                if tag == SAMPLE || tag == HTTP_SAMPLE {
                    return Ok(Some(self.sample_builder(&element)?.build()));
                }
                Ok(None)
            }
            Event::End(element) => {
                let name = element.local_name();
                let tag = name.as_ref();
                if tag == SAMPLE || tag == HTTP_SAMPLE {
                    return Ok(self.open_samples.pop().map(RecordBuilder::build));
                }
                if tag == ASSERTION_RESULT {
                    self.close_assertion();
                } else if let Some(assertion) = self.assertion.as_mut() {
                    assertion.field = None;
                }
                Ok(None)
            }
            Event::Text(text) => {
                if let Some(assertion) = self.assertion.as_mut() {
                    assertion.append(&text.unescape()?);
                }
                Ok(None)
            }
            Event::CData(data) => {
                if let Some(assertion) = self.assertion.as_mut() {
                    assertion.append(&String::from_utf8_lossy(&data.into_inner()));
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn at_end_of_input(&mut self, buf: &mut Vec<u8>) -> bool {
        buf.clear();
        matches!(
            self.reader.read_event_into(buf),
            Ok(Event::Eof) | Err(quick_xml::Error::UnexpectedEof(_))
        )
    }

    fn finish(&mut self) {
        self.finished = true;
        if !self.open_samples.is_empty() {
            warn!(
                "Dropping {} sample(s) left open at end of document",
                self.open_samples.len()
            );
            self.open_samples.clear();
        }
    }
}

impl<R: BufRead> Iterator for XmlRecordSource<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let mut buf = std::mem::take(&mut self.buf);
            let mut malformed = None;
            let outcome = match self.reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => {
                    self.finish();
                    None
                }
                // The load generator may still be appending to the file.
                Err(quick_xml::Error::UnexpectedEof(context)) => {
                    warn!("XML document ends prematurely ({}), stopping", context);
                    self.finish();
                    None
                }
                Err(err) => {
                    self.finished = true;
                    Some(Err(ParseError::from(err)))
                }
                Ok(event) => match self.handle(event) {
                    Ok(record) => record.map(Ok),
                    Err(err) => {
                        malformed = Some(err);
                        None
                    }
                },
            };

            // A tag cut off by end of input arrives as a partial start tag.
            let outcome = match malformed {
                Some(err) if self.at_end_of_input(&mut buf) => {
                    warn!("XML document ends inside a tag ({}), stopping", err);
                    self.finish();
                    None
                }
                Some(err) => {
                    self.finished = true;
                    Some(Err(err))
                }
                None => outcome,
            };
            buf.clear();
            self.buf = buf;

            if outcome.is_some() {
                return outcome;
            }
        }
        None
    }
}
