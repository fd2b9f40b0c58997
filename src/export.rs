//! Output sinks for a finished run.
//!
//! Counts go out as a tab-separated table. Spans go out as a trace document:
//! a resource block, one root span covering the run and one child span per
//! process lifetime.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use std::io::{self, Write};

use crate::aggregate::{CommandCount, ProcessSpan};

/// Writes the `count\tcommand` table.
pub fn write_counts<W: Write>(out: &mut W, rows: &[CommandCount]) -> io::Result<()> {
    writeln!(out, "count\tcommand")?;
    for row in rows.iter().filter(|r| r.count > 0) {
        writeln!(out, "{}\t{}", row.count, row.command)?;
    }
    out.flush()
}

/// Attributes describing what produced the trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceResource {
    #[serde(rename = "service.name")]
    pub service_name: String,
    #[serde(rename = "service.version")]
    pub service_version: String,
}

impl TraceResource {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One exported span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
}

/// A full trace for one run.
#[derive(Debug, Clone, Serialize)]
pub struct TraceDocument {
    pub resource: TraceResource,
    pub spans: Vec<SpanRecord>,
}

impl TraceDocument {
    /// Builds the trace: the root span `run_name` spans `[started_at,
    /// finished_at]` and parents every process span.
    pub fn build(
        resource: TraceResource,
        run_name: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        spans: &[ProcessSpan],
    ) -> Self {
        let mut rng = rand::thread_rng();
        let trace_id = random_hex(&mut rng, 16);
        let root_id = random_hex(&mut rng, 8);

        let mut records = Vec::with_capacity(spans.len() + 1);
        records.push(SpanRecord {
            trace_id: trace_id.clone(),
            span_id: root_id.clone(),
            parent_span_id: None,
            name: run_name.to_string(),
            pid: None,
            start_time: rfc3339(started_at),
            end_time: rfc3339(finished_at),
            duration_ms: (finished_at - started_at).num_milliseconds(),
        });
        for span in spans {
            records.push(SpanRecord {
                trace_id: trace_id.clone(),
                span_id: random_hex(&mut rng, 8),
                parent_span_id: Some(root_id.clone()),
                name: span.command.clone(),
                pid: Some(span.pid),
                start_time: rfc3339(span.start),
                end_time: rfc3339(span.end),
                duration_ms: span.duration_ms(),
            });
        }

        Self {
            resource,
            spans: records,
        }
    }
}

/// Destination for finished traces.
pub trait SpanExporter {
    fn export(&mut self, trace: &TraceDocument) -> io::Result<()>;
}

/// Pretty-printed JSON to any writer.
pub struct JsonSpanExporter<W: Write> {
    out: W,
}

impl<W: Write> JsonSpanExporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SpanExporter for JsonSpanExporter<W> {
    fn export(&mut self, trace: &TraceDocument) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, trace)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

fn random_hex<R: Rng>(rng: &mut R, bytes: usize) -> String {
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
