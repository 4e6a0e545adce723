//! Single-file HTML rendering of a [`ReportModel`].
//!
//! The document is self-contained (inline style sheet, no scripts) so it can be mailed or
//! archived next to the raw results. Every piece of text that originates from the input
//! files goes through [`escape_html`].

use crate::results::{
    ErrorDetailRow, ErrorMessageRow, ErrorSummaryRow, HistogramRow, LabelRow, ReportModel,
};
use crate::utils::{
    escape_html, format_decimal, format_duration, format_number, format_optional_time,
    format_percent, format_time,
};
use std::io::{self, Write};
use std::time::Duration;

const STYLE: &str = r#"
body { font: normal 68% verdana, arial, helvetica; color: #000000; }
table tr td, table tr th { font-size: 68%; }
table.details tr th { font-weight: bold; text-align: left; background: #a6caf0; }
table.details tr td { background: #eeeee0; }
h1 { margin: 0px 0px 5px; font: 165% verdana, arial, helvetica; }
h2 { margin-top: 1em; margin-bottom: 0.5em; font: bold 125% verdana, arial, helvetica; }
.Failure { font-weight: bold; color: red; }
"#;

const TABLE_OPEN: &str =
    r#"<table width="95%" cellspacing="2" cellpadding="5" border="0" class="details">"#;

pub struct HtmlReportWriter<'m, 'w, W: Write> {
    w: &'w mut W,
    model: &'m ReportModel,
}

impl<'m, 'w, W: Write> HtmlReportWriter<'m, 'w, W> {
    pub fn new(w: &'w mut W, model: &'m ReportModel) -> Self {
        Self { w, model }
    }

    pub fn write(mut self) -> io::Result<()> {
        self.write_head()?;
        self.write_summary()?;
        self.write_pages_overview()?;
        self.write_pages_detail()?;
        if self.model.has_failures() {
            self.write_error_summary()?;
            self.write_error_details()?;
            self.write_error_messages()?;
        }
        self.write_properties()?;
        writeln!(self.w, "</body>\n</html>")
    }

    fn write_head(&mut self) -> io::Result<()> {
        let title = escape_html(&self.model.title);
        writeln!(
            self.w,
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style type="text/css">{STYLE}</style>
</head>
<body>
<h1>{title}</h1>
<table width="100%">
<tr><td align="left"></td><td align="right">Generated {created} by jmeter-sla-report {version}</td></tr>
</table>
<hr size="1">"#,
            created = format_time(&self.model.system_info.created_at),
            version = escape_html(&self.model.system_info.version),
        )
    }

    fn write_summary(&mut self) -> io::Result<()> {
        let summary = &self.model.summary;
        let class = failure_class(summary.failures);
        let duration = Duration::from_millis(summary.duration_ms.max(0) as u64);
        let throughput = summary
            .throughput
            .map_or_else(|| "-".to_string(), |rps| format!("{} /s", format_decimal(rps)));

        writeln!(
            self.w,
            r#"<h2>Summary</h2>
{TABLE_OPEN}
<tr valign="top"><th>Requests</th><th>Failures</th><th>Success Rate</th><th>Average Time</th><th>Min Time</th><th>Max Time</th><th>First Request</th><th>Last Request</th><th>Duration</th><th>Throughput</th></tr>
<tr valign="top" class="{class}"><td>{requests}</td><td>{failures}</td><td>{rate}</td><td>{average} ms</td><td>{min} ms</td><td>{max} ms</td><td>{first}</td><td>{last}</td><td>{duration}</td><td>{throughput}</td></tr>
</table>
<hr size="1">"#,
            requests = format_number(summary.requests),
            failures = format_number(summary.failures),
            rate = format_percent(summary.success_rate),
            average = format_decimal(summary.average_ms),
            min = format_decimal(summary.min_ms),
            max = format_decimal(summary.max_ms),
            first = format_optional_time(summary.first_request.as_ref()),
            last = format_optional_time(summary.last_request.as_ref()),
            duration = format_duration(duration),
        )
    }

    fn write_pages_overview(&mut self) -> io::Result<()> {
        writeln!(
            self.w,
            r#"<h2>Pages Overview (ms)</h2>
{TABLE_OPEN}
<tr><th>Label</th><th>Requests</th><th>Avg</th><th>Total</th><th>StdDev</th><th>Min Time</th><th>Max Time</th><th>First Access</th><th>Last Access</th><th>Avg Size (kb)</th><th>Failures</th></tr>"#
        )?;

        for LabelRow {
            label,
            requests,
            average_ms,
            total_ms,
            std_dev_ms,
            min_ms,
            max_ms,
            first_access,
            last_access,
            failures,
            average_kb,
        } in &self.model.pages
        {
            writeln!(
                self.w,
                r#"<tr valign="top" class="{class}"><td>{label}</td><td>{requests}</td><td>{avg}</td><td>{total}</td><td>{std_dev}</td><td>{min}</td><td>{max}</td><td>{first}</td><td>{last}</td><td>{kb}</td><td>{failures}</td></tr>"#,
                class = failure_class(*failures),
                label = escape_html(label),
                requests = format_number(*requests),
                avg = format_decimal(*average_ms),
                total = format_decimal(*total_ms),
                std_dev = format_decimal(*std_dev_ms),
                min = format_decimal(*min_ms),
                max = format_decimal(*max_ms),
                first = format_optional_time(first_access.as_ref()),
                last = format_optional_time(last_access.as_ref()),
                kb = average_kb.map_or_else(|| "-".to_string(), format_decimal),
                failures = format_number(*failures),
            )?;
        }
        writeln!(self.w, "</table>\n<hr size=\"1\">")
    }

    fn write_pages_detail(&mut self) -> io::Result<()> {
        write!(
            self.w,
            "<h2>Pages Detail Table (ms)</h2>\n{TABLE_OPEN}\n<tr><th>Label</th><th>Requests</th>"
        )?;
        for bucket in &self.model.histogram_header {
            write!(self.w, "<th>{}</th>", escape_html(bucket))?;
        }
        writeln!(self.w, "</tr>")?;

        for HistogramRow {
            label,
            requests,
            buckets,
        } in &self.model.histograms
        {
            write!(
                self.w,
                "<tr valign=\"top\"><td>{}</td><td>{}</td>",
                escape_html(label),
                format_number(*requests)
            )?;
            for count in buckets {
                write!(self.w, "<td>{}</td>", format_number(*count))?;
            }
            writeln!(self.w, "</tr>")?;
        }
        writeln!(self.w, "</table>\n<hr size=\"1\">")
    }

    fn write_error_summary(&mut self) -> io::Result<()> {
        writeln!(
            self.w,
            "<h2>Error Summary</h2>\n{TABLE_OPEN}\n<tr><th>Label</th><th>Errors</th></tr>"
        )?;
        for ErrorSummaryRow { label, errors } in &self.model.error_summary {
            writeln!(
                self.w,
                r#"<tr valign="top" class="Failure"><td>{}</td><td>{}</td></tr>"#,
                escape_html(label),
                format_number(*errors)
            )?;
        }
        writeln!(self.w, "</table>\n<hr size=\"1\">")
    }

    fn write_error_details(&mut self) -> io::Result<()> {
        writeln!(
            self.w,
            "<h2>Error Details</h2>\n{TABLE_OPEN}\n<tr><th>Label</th><th>Errors</th><th>Avg</th><th>Max Time</th><th>First</th><th>Last</th></tr>"
        )?;
        for ErrorDetailRow {
            error_label,
            errors,
            average_ms,
            max_ms,
            first,
            last,
        } in &self.model.error_details
        {
            writeln!(
                self.w,
                r#"<tr valign="top" class="Failure"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                escape_html(error_label),
                format_number(*errors),
                format_decimal(*average_ms),
                format_decimal(*max_ms),
                format_optional_time(first.as_ref()),
                format_optional_time(last.as_ref()),
            )?;
        }
        writeln!(self.w, "</table>\n<hr size=\"1\">")
    }

    fn write_error_messages(&mut self) -> io::Result<()> {
        writeln!(
            self.w,
            "<h2>Error Messages</h2>\n{TABLE_OPEN}\n<tr><th>Label</th><th>Date</th><th>Error Code</th><th>Error Message</th></tr>"
        )?;
        for ErrorMessageRow {
            label,
            error_code,
            message,
            timestamp,
            ..
        } in &self.model.error_messages
        {
            writeln!(
                self.w,
                r#"<tr valign="top"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                escape_html(label),
                format_time(timestamp),
                escape_html(error_code),
                escape_html(message),
            )?;
        }
        writeln!(self.w, "</table>\n<hr size=\"1\">")
    }

    fn write_properties(&mut self) -> io::Result<()> {
        writeln!(
            self.w,
            "<h2>Report Properties</h2>\n{TABLE_OPEN}\n<tr><th>Key</th><th>Value</th></tr>"
        )?;
        for (key, value) in self.model.properties() {
            writeln!(
                self.w,
                r#"<tr valign="top"><td>{}</td><td>{}</td></tr>"#,
                escape_html(&key),
                escape_html(&value)
            )?;
        }
        writeln!(self.w, "</table>")
    }
}

fn failure_class(failures: u64) -> &'static str {
    if failures > 0 {
        "Failure"
    } else {
        ""
    }
}
