//! Report sinks for the end-of-run summary.
//!
//! All sinks write to any `io::Write`; `main` hands them locked stdout.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use zsync_config::ReportFormat;
use zsync_reconcile::{ReportSink, RunReport};

/// Run metadata printed alongside the counters in `kv` and `json` modes.
#[derive(Clone, Debug)]
pub struct RunMeta {
    pub run_id: String,
    pub started_at_utc: DateTime<Utc>,
    pub config_hash: String,
}

pub fn sink_for<'a, W: Write + 'a>(
    format: ReportFormat,
    meta: RunMeta,
    out: W,
) -> Box<dyn ReportSink + 'a> {
    match format {
        ReportFormat::Table => Box::new(TableSink { out }),
        ReportFormat::Kv => Box::new(KvSink { meta, out }),
        ReportFormat::Json => Box::new(JsonSink { meta, out }),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Two-column box table:
///
/// ```text
/// +-----------------+----------+
/// | User(s) created | 2        |
/// | User(s) deleted | 1        |
/// |                 |          |
/// | Elapsed time    | 0.42 sec |
/// +-----------------+----------+
/// ```
pub struct TableSink<W> {
    out: W,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

fn table_rows(report: &RunReport) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("User(s) created", report.created.to_string()),
        ("User(s) deleted", report.deleted.to_string()),
    ];
    if report.failed_creates() > 0 {
        rows.push(("Failed to create", report.failed_creates().to_string()));
    }
    if report.failed_deletes() > 0 {
        rows.push(("Failed to delete", report.failed_deletes().to_string()));
    }
    rows.push(("", String::new()));
    rows.push(("Elapsed time", format!("{:.2} sec", report.elapsed_seconds)));
    rows
}

impl<W: Write> ReportSink for TableSink<W> {
    fn emit(&mut self, report: &RunReport) -> io::Result<()> {
        let rows = table_rows(report);
        let left = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
        let right = rows.iter().map(|(_, r)| r.chars().count()).max().unwrap_or(0);
        let border = format!("+{}+{}+", "-".repeat(left + 2), "-".repeat(right + 2));

        writeln!(self.out, "{border}")?;
        for (label, value) in &rows {
            writeln!(self.out, "| {label:<left$} | {value:<right$} |")?;
        }
        writeln!(self.out, "{border}")?;
        self.out.flush()
    }
}

// ---------------------------------------------------------------------------
// key=value
// ---------------------------------------------------------------------------

pub struct KvSink<W> {
    meta: RunMeta,
    out: W,
}

impl<W: Write> KvSink<W> {
    pub fn new(meta: RunMeta, out: W) -> Self {
        Self { meta, out }
    }
}

impl<W: Write> ReportSink for KvSink<W> {
    fn emit(&mut self, report: &RunReport) -> io::Result<()> {
        let out = &mut self.out;
        writeln!(out, "run_id={}", self.meta.run_id)?;
        writeln!(
            out,
            "started_at_utc={}",
            self.meta
                .started_at_utc
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(out, "config_hash={}", self.meta.config_hash)?;
        writeln!(out, "created={}", report.created)?;
        writeln!(out, "deleted={}", report.deleted)?;
        writeln!(out, "failed_creates={}", report.failed_creates())?;
        writeln!(out, "failed_deletes={}", report.failed_deletes())?;
        for failure in &report.failures {
            writeln!(out, "failure={failure}")?;
        }
        writeln!(out, "elapsed_seconds={:.3}", report.elapsed_seconds)?;
        out.flush()
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub struct JsonSink<W> {
    meta: RunMeta,
    out: W,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: &'a str,
    started_at_utc: DateTime<Utc>,
    config_hash: &'a str,
    #[serde(flatten)]
    report: &'a RunReport,
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn emit(&mut self, report: &RunReport) -> io::Result<()> {
        let doc = JsonReport {
            run_id: &self.meta.run_id,
            started_at_utc: self.meta.started_at_utc,
            config_hash: &self.meta.config_hash,
            report,
        };
        serde_json::to_writer(&mut self.out, &doc)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
