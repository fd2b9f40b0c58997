//! Terminal reducers for the sampled subtree.
//!
//! - `count`: command occurrences per tick, printed as a histogram
//! - `span`: one span per process lifetime, handed to a trace exporter

pub mod count;
pub mod span;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::diff::Transition;
use crate::process::Snapshot;

pub use count::{CommandCount, CommandCounter};
pub use span::{ProcessSpan, SpanBuilder};

/// Which summary a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Count,
    Trace,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(OutputMode::Count),
            "trace" => Ok(OutputMode::Trace),
            other => Err(format!(
                "Invalid output_mode '{}', expected 'count' or 'trace'",
                other
            )),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Count => f.write_str("count"),
            OutputMode::Trace => f.write_str("trace"),
        }
    }
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Counts(Vec<CommandCount>),
    Spans(Vec<ProcessSpan>),
}

/// Consumes every tick of a run and produces its summary.
pub trait Aggregator: Send {
    /// Called once per tick with the selected snapshot and the transitions
    /// that led to it. The final flush passes an empty snapshot.
    fn observe(&mut self, selected: &Snapshot, transitions: &[Transition]);

    /// Closes the run at `at` and returns the summary.
    fn finish(&mut self, at: DateTime<Utc>) -> Summary;
}

/// Creates the aggregator for an output mode.
pub fn aggregator_for(mode: OutputMode) -> Box<dyn Aggregator> {
    match mode {
        OutputMode::Count => Box::new(CommandCounter::new()),
        OutputMode::Trace => Box::new(SpanBuilder::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("count".parse::<OutputMode>().unwrap(), OutputMode::Count);
        assert_eq!("trace".parse::<OutputMode>().unwrap(), OutputMode::Trace);
        assert!("json".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_aggregator_for_mode() {
        let at = Utc::now();
        assert!(matches!(
            aggregator_for(OutputMode::Count).finish(at),
            Summary::Counts(rows) if rows.is_empty()
        ));
        assert!(matches!(
            aggregator_for(OutputMode::Trace).finish(at),
            Summary::Spans(spans) if spans.is_empty()
        ));
    }
}
