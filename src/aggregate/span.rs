//! Lifetime spans built from start/end transitions.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{Aggregator, Summary};
use crate::diff::{Transition, TransitionKind};
use crate::process::Snapshot;

/// Observed lifetime of one process.
///
/// `end` is the first tick at which the process was missing, not the last
/// tick at which it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSpan {
    pub pid: u32,
    pub command: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ProcessSpan {
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

#[derive(Debug, Default)]
pub struct SpanBuilder {
    open: HashMap<u32, (String, DateTime<Utc>)>,
    closed: Vec<ProcessSpan>,
}

impl SpanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processes started but not yet ended.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn apply(&mut self, transition: &Transition) {
        match transition.kind {
            TransitionKind::Started => {
                self.open
                    .insert(transition.pid, (transition.command.clone(), transition.at));
            }
            TransitionKind::Ended => {
                if let Some((command, start)) = self.open.remove(&transition.pid) {
                    self.closed.push(ProcessSpan {
                        pid: transition.pid,
                        command,
                        start,
                        end: transition.at,
                    });
                }
            }
        }
    }
}

impl Aggregator for SpanBuilder {
    fn observe(&mut self, _selected: &Snapshot, transitions: &[Transition]) {
        for transition in transitions {
            self.apply(transition);
        }
    }

    fn finish(&mut self, at: DateTime<Utc>) -> Summary {
        let mut still_open: Vec<(u32, (String, DateTime<Utc>))> = self.open.drain().collect();
        still_open.sort_by_key(|(pid, _)| *pid);
        for (pid, (command, start)) in still_open {
            self.closed.push(ProcessSpan {
                pid,
                command,
                start,
                end: at,
            });
        }

        let mut spans = std::mem::take(&mut self.closed);
        spans.sort_by(|a, b| a.start.cmp(&b.start).then(a.pid.cmp(&b.pid)));
        Summary::Spans(spans)
    }
}
