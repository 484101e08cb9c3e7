//! Session and cycle spans for observability.
//!
//! A session span is opened before the first question and parents one cycle
//! span per question. Each span follows `open → update_input → update_output →
//! close`; user ratings attach to a span as metrics. Sinks only record: the
//! core never reads anything back, and a failing sink is logged and ignored.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::time::{now_utc_rfc3339_lossy, unique_id};

pub const TRACE_FILE_NAME: &str = "traces.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl SpanId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Session,
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Opened {
        span: SpanId,
        kind: SpanKind,
        parent: Option<SpanId>,
    },
    Input {
        span: SpanId,
        text: String,
    },
    Output {
        span: SpanId,
        text: String,
    },
    Metric {
        span: SpanId,
        name: String,
        value: String,
        comment: Option<String>,
    },
    Closed {
        span: SpanId,
    },
}

impl TraceEvent {
    #[must_use]
    pub fn span(&self) -> &SpanId {
        match self {
            Self::Opened { span, .. }
            | Self::Input { span, .. }
            | Self::Output { span, .. }
            | Self::Metric { span, .. }
            | Self::Closed { span } => span,
        }
    }
}

pub trait TraceSink {
    fn record(&mut self, event: &TraceEvent) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&mut self, _event: &TraceEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps events in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryTraceSink {
    events: Rc<RefCell<Vec<TraceEvent>>>,
}

impl MemoryTraceSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&mut self, event: &TraceEvent) -> Result<()> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TraceLine<'a> {
    recorded_at_utc: String,
    #[serde(flatten)]
    event: &'a TraceEvent,
}

/// Appends one JSON object per event to `<dir>/traces.jsonl`.
#[derive(Debug)]
pub struct JsonlTraceSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlTraceSink {
    pub fn open(trace_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(trace_dir).with_context(|| {
            format!("failed to create trace directory: {}", trace_dir.display())
        })?;
        let path = trace_dir.join(TRACE_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open trace file: {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&mut self, event: &TraceEvent) -> Result<()> {
        let line = TraceLine {
            recorded_at_utc: now_utc_rfc3339_lossy(),
            event,
        };
        serde_json::to_writer(&mut self.writer, &line).context("failed to encode trace event")?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("failed to write trace file: {}", self.path.display()))
    }
}

/// Allocates span ids and forwards lifecycle calls to a sink.
pub struct Tracer {
    sink: Box<dyn TraceSink>,
    trace_id: String,
    next_span: u64,
}

impl Tracer {
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        Self {
            sink,
            trace_id: unique_id("trace"),
            next_span: 0,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Box::new(NullTraceSink))
    }

    pub fn open(&mut self, kind: SpanKind, parent: Option<&SpanId>) -> SpanId {
        let prefix = match kind {
            SpanKind::Session => "session",
            SpanKind::Cycle => "cycle",
        };
        self.next_span += 1;
        let span = SpanId(format!("{prefix}-{}-{}", self.trace_id, self.next_span));
        self.emit(TraceEvent::Opened {
            span: span.clone(),
            kind,
            parent: parent.cloned(),
        });
        span
    }

    pub fn update_input(&mut self, span: &SpanId, text: &str) {
        self.emit(TraceEvent::Input {
            span: span.clone(),
            text: text.to_string(),
        });
    }

    pub fn update_output(&mut self, span: &SpanId, text: &str) {
        self.emit(TraceEvent::Output {
            span: span.clone(),
            text: text.to_string(),
        });
    }

    pub fn save_metric(&mut self, span: &SpanId, name: &str, value: &str, comment: Option<&str>) {
        self.emit(TraceEvent::Metric {
            span: span.clone(),
            name: name.to_string(),
            value: value.to_string(),
            comment: comment.map(ToString::to_string),
        });
    }

    pub fn close(&mut self, span: &SpanId) {
        self.emit(TraceEvent::Closed { span: span.clone() });
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Err(error) = self.sink.record(&event) {
            tracing::warn!(span = event.span().as_str(), "trace sink failed: {error:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryTraceSink, SpanKind, TraceEvent, Tracer};

    #[test]
    fn cycle_spans_are_parented_by_the_session_span() {
        let sink = MemoryTraceSink::new();
        let mut tracer = Tracer::new(Box::new(sink.clone()));

        let session = tracer.open(SpanKind::Session, None);
        let cycle = tracer.open(SpanKind::Cycle, Some(&session));
        tracer.update_input(&cycle, "who works here");
        tracer.close(&cycle);

        let events = sink.events();
        assert_eq!(events.len(), 4);
        assert!(session.as_str().starts_with("session-"));
        assert_eq!(
            events[1],
            TraceEvent::Opened {
                span: cycle.clone(),
                kind: SpanKind::Cycle,
                parent: Some(session),
            }
        );
        assert_eq!(events[3], TraceEvent::Closed { span: cycle });
    }
}
