//! Process table modules: records, parsing, tree building and subtree selection.
//!
//! This module provides:
//! - `record`: `ProcessRecord`, `Snapshot` and the column layout
//! - `parser`: fixed-column text parsing
//! - `tree`: parent -> children linking
//! - `selector`: breadth-first subtree selection from a root rule
//! - `source`: process table sources (`ps`)

pub mod parser;
pub mod record;
pub mod selector;
pub mod source;
pub mod tree;

use chrono::{DateTime, Utc};

// Re-export commonly used types
pub use parser::{parse_line, parse_table, split_columns, ParseError};
pub use record::{Column, ColumnError, ColumnLayout, ProcessRecord, Snapshot};
pub use selector::{RootRule, SubtreeSelector};
pub use source::{CaptureError, ProcessTableSource, PsSource, RawTable};
pub use tree::build_tree;

/// Parses a raw table and links it into a tree snapshot.
pub fn snapshot_from_raw(raw: &RawTable, layout: &ColumnLayout) -> Result<Snapshot, ParseError> {
    snapshot_from_text(&raw.text, layout, raw.captured_at, raw.lister_pid)
}

/// Parses table text captured at `captured_at` and links it into a snapshot.
pub fn snapshot_from_text(
    text: &str,
    layout: &ColumnLayout,
    captured_at: DateTime<Utc>,
    skip_pid: Option<u32>,
) -> Result<Snapshot, ParseError> {
    let records = parse_table(text, layout, captured_at, skip_pid)?;
    Ok(build_tree(records, captured_at))
}
