//! pstree-prof library
//!
//! Samples the process table at a fixed interval, rebuilds the subtree that
//! descends from a launched command (or from every process matching a
//! pattern) and summarizes what ran in it.
//!
//! # Pipeline
//!
//! - **Parse**: `ps` text -> [`ProcessRecord`]s ([`process::parser`])
//! - **Link**: records -> parent/children tree ([`process::tree`])
//! - **Select**: breadth-first walk from the root set ([`process::selector`])
//! - **Diff**: previous vs current selection -> [`Transition`]s ([`diff`])
//! - **Aggregate**: command histogram or lifetime spans ([`aggregate`])
//!
//! # Usage
//!
//! ```rust
//! use chrono::Utc;
//! use pstree_prof::{
//!     diff, snapshot_from_text, ColumnLayout, Identity, RootRule, Snapshot, SubtreeSelector,
//! };
//!
//! let text = "USER PID PPID PGID COMMAND\n\
//!             alice 10 1 10 make\n\
//!             alice 11 10 10 cc main.c\n";
//! let tree = snapshot_from_text(text, &ColumnLayout::default(), Utc::now(), None).unwrap();
//!
//! let selected = SubtreeSelector::new(RootRule::ExactPid(10)).select(&tree);
//! assert_eq!(selected.len(), 2);
//!
//! let events = diff(&Snapshot::empty(tree.captured_at), &selected, Identity::Pid);
//! assert_eq!(events.len(), 2);
//! ```

pub mod aggregate;
pub mod diff;
pub mod export;
pub mod launcher;
pub mod process;
pub mod sampler;

// Re-export main types for convenience
pub use aggregate::{
    aggregator_for, Aggregator, CommandCount, CommandCounter, OutputMode, ProcessSpan,
    SpanBuilder, Summary,
};
pub use diff::{diff, Identity, Transition, TransitionKind};
pub use export::{write_counts, JsonSpanExporter, SpanExporter, TraceDocument, TraceResource};
pub use launcher::{launch, split_command_line, LaunchError, LaunchedCommand};
pub use process::{
    build_tree, parse_table, snapshot_from_raw, snapshot_from_text, split_columns, CaptureError,
    Column, ColumnError, ColumnLayout, ParseError, ProcessRecord, ProcessTableSource, PsSource,
    RawTable, RootRule, Snapshot, SubtreeSelector,
};
pub use sampler::{RunReport, Sampler, StopReason, StopSignal};
