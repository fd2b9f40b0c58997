//! Process records, snapshots and the column layout of the process table.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub owner: String,
    pub pid: u32,
    pub parent_pid: u32,
    pub process_group: u32,
    pub command: String,
    /// Start time derived from an `etimes` column, when one was captured.
    pub started_at: Option<DateTime<Utc>>,
    /// Child pids, filled in by the tree builder. Empty right after parsing.
    pub children: Vec<u32>,
}

/// The process table, or a selected part of it, at one instant.
///
/// Keyed by pid. Pids are only unique within a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub processes: BTreeMap<u32, ProcessRecord>,
}

impl Snapshot {
    /// An empty snapshot, used as the previous sample on the first tick and
    /// as the current sample of the final flush.
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            processes: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.processes.get(&pid)
    }
}

/// A field of the process table and the `ps` column name that produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Owner,
    Pid,
    ParentPid,
    ProcessGroup,
    /// Seconds since the process started.
    ElapsedSeconds,
    Command,
}

impl Column {
    /// Name passed to `ps -o`.
    pub fn ps_name(&self) -> &'static str {
        match self {
            Column::Owner => "user",
            Column::Pid => "pid",
            Column::ParentPid => "ppid",
            Column::ProcessGroup => "pgid",
            Column::ElapsedSeconds => "etimes",
            Column::Command => "command",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ps_name())
    }
}

impl FromStr for Column {
    type Err = ColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "owner" => Ok(Column::Owner),
            "pid" => Ok(Column::Pid),
            "ppid" => Ok(Column::ParentPid),
            "pgid" | "pgrp" => Ok(Column::ProcessGroup),
            "etimes" => Ok(Column::ElapsedSeconds),
            "command" | "args" | "cmd" => Ok(Column::Command),
            other => Err(ColumnError::Unknown(other.to_string())),
        }
    }
}

/// Ordered column list of the process table.
///
/// Every required field appears exactly once and the command is last, since
/// it is the only column allowed to contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    columns: Vec<Column>,
}

const REQUIRED_COLUMNS: [Column; 5] = [
    Column::Owner,
    Column::Pid,
    Column::ParentPid,
    Column::ProcessGroup,
    Column::Command,
];

impl ColumnLayout {
    pub fn new(columns: Vec<Column>) -> Result<Self, ColumnError> {
        for required in REQUIRED_COLUMNS {
            match columns.iter().filter(|c| **c == required).count() {
                0 => return Err(ColumnError::Missing(required)),
                1 => {}
                _ => return Err(ColumnError::Duplicate(required)),
            }
        }
        if columns
            .iter()
            .filter(|c| **c == Column::ElapsedSeconds)
            .count()
            > 1
        {
            return Err(ColumnError::Duplicate(Column::ElapsedSeconds));
        }
        if columns.last() != Some(&Column::Command) {
            return Err(ColumnError::CommandNotLast);
        }
        Ok(Self { columns })
    }

    /// Parses a list of `ps` column names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ColumnError> {
        let columns = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<Column>, _>>()?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Returns this layout with an `etimes` column inserted before the command.
    pub fn with_elapsed_seconds(mut self) -> Self {
        if !self.has(Column::ElapsedSeconds) {
            let at = self.columns.len() - 1;
            self.columns.insert(at, Column::ElapsedSeconds);
        }
        self
    }

    /// The `-o` argument for `ps`, e.g. `user,pid,ppid,pgid,command`.
    pub fn ps_format(&self) -> String {
        self.columns
            .iter()
            .map(Column::ps_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            columns: REQUIRED_COLUMNS.to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColumnError {
    #[error("unknown process table column '{0}'")]
    Unknown(String),

    #[error("process table column '{0}' is missing")]
    Missing(Column),

    #[error("process table column '{0}' appears more than once")]
    Duplicate(Column),

    #[error("the command column must be the last column")]
    CommandNotLast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_matches_ps_format() {
        assert_eq!(
            ColumnLayout::default().ps_format(),
            "user,pid,ppid,pgid,command"
        );
    }

    #[test]
    fn test_layout_accepts_reordered_columns() {
        let layout = ColumnLayout::from_names(&["pid", "pgid", "user", "ppid", "args"]).unwrap();
        assert_eq!(layout.ps_format(), "pid,pgid,user,ppid,command");
    }

    #[test]
    fn test_layout_rejects_command_not_last() {
        let err = ColumnLayout::from_names(&["command", "user", "pid", "ppid", "pgid"]).unwrap_err();
        assert_eq!(err, ColumnError::CommandNotLast);
    }

    #[test]
    fn test_layout_rejects_missing_and_duplicate() {
        assert_eq!(
            ColumnLayout::from_names(&["user", "pid", "pgid", "command"]).unwrap_err(),
            ColumnError::Missing(Column::ParentPid)
        );
        assert_eq!(
            ColumnLayout::from_names(&["user", "pid", "pid", "ppid", "pgid", "command"])
                .unwrap_err(),
            ColumnError::Duplicate(Column::Pid)
        );
        assert!(matches!(
            ColumnLayout::from_names(&["user", "pid", "ppid", "pgid", "rss", "command"]),
            Err(ColumnError::Unknown(_))
        ));
    }

    #[test]
    fn test_with_elapsed_seconds_inserts_before_command() {
        let layout = ColumnLayout::default().with_elapsed_seconds();
        assert_eq!(layout.ps_format(), "user,pid,ppid,pgid,etimes,command");
        // Idempotent
        assert_eq!(layout.clone().with_elapsed_seconds(), layout);
    }
}
