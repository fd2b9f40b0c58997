//! Parser for the fixed-column text dump of the process table.
//!
//! The dump is a header line followed by one line per process. Columns are
//! separated by runs of spaces, and the last column (the command) is taken
//! verbatim because it may itself contain spaces.

use ahash::AHashSet as HashSet;
use chrono::{DateTime, Duration, Utc};

use crate::process::record::{Column, ColumnLayout, ProcessRecord};

/// Splits one line into `count` fields.
///
/// A field ends at the first space after a run of non-space characters and
/// the next field starts at the first non-space character after that. The
/// last field is the rest of the line, untouched. Returns `None` when the line
/// runs out before all fields are found or the last field is blank.
pub fn split_columns(line: &str, count: usize) -> Option<Vec<&str>> {
    if count == 0 {
        return Some(Vec::new());
    }

    let mut fields = Vec::with_capacity(count);
    let mut rest = line;
    while fields.len() < count - 1 {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }

    let last = rest.trim_start_matches(' ');
    if last.trim().is_empty() {
        return None;
    }
    fields.push(last);
    Some(fields)
}

/// Parses a full process table dump.
///
/// `skip_pid` is the pid of the process that produced the dump, which sees
/// itself in its own output and is dropped. Any malformed line fails the whole
/// table.
pub fn parse_table(
    text: &str,
    layout: &ColumnLayout,
    captured_at: DateTime<Utc>,
    skip_pid: Option<u32>,
) -> Result<Vec<ProcessRecord>, ParseError> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return Err(ParseError::MissingHeader);
    }

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(lines.len() - 1);
    // Line numbers are 1-based and count the header.
    for (index, line) in lines.iter().enumerate().skip(1) {
        let record = parse_line(line, layout, captured_at, index + 1)?;
        if Some(record.pid) == skip_pid {
            continue;
        }
        if !seen.insert(record.pid) {
            return Err(ParseError::DuplicatePid {
                line: index + 1,
                pid: record.pid,
            });
        }
        records.push(record);
    }
    Ok(records)
}

/// Parses one data line into a record with no children.
pub fn parse_line(
    line: &str,
    layout: &ColumnLayout,
    captured_at: DateTime<Utc>,
    line_number: usize,
) -> Result<ProcessRecord, ParseError> {
    let columns = layout.columns();
    let fields = split_columns(line, columns.len()).ok_or_else(|| ParseError::MissingColumns {
        line: line_number,
        expected: columns.len(),
        content: line.to_string(),
    })?;

    let mut owner = None;
    let mut pid = None;
    let mut parent_pid = None;
    let mut process_group = None;
    let mut command = None;
    let mut started_at = None;

    for (column, field) in columns.iter().zip(fields) {
        match column {
            Column::Owner => owner = Some(field.to_string()),
            Column::Pid => pid = Some(parse_number(field, *column, line_number)?),
            Column::ParentPid => parent_pid = Some(parse_number(field, *column, line_number)?),
            Column::ProcessGroup => {
                process_group = Some(parse_number(field, *column, line_number)?)
            }
            Column::ElapsedSeconds => {
                let elapsed: u32 = parse_number(field, *column, line_number)?;
                started_at = Some(captured_at - Duration::seconds(i64::from(elapsed)));
            }
            Column::Command => command = Some(field.to_string()),
        }
    }

    // ColumnLayout guarantees every required column is present.
    match (owner, pid, parent_pid, process_group, command) {
        (Some(owner), Some(pid), Some(parent_pid), Some(process_group), Some(command)) => {
            Ok(ProcessRecord {
                owner,
                pid,
                parent_pid,
                process_group,
                command,
                started_at,
                children: Vec::new(),
            })
        }
        _ => Err(ParseError::MissingColumns {
            line: line_number,
            expected: columns.len(),
            content: line.to_string(),
        }),
    }
}

fn parse_number(field: &str, column: Column, line: usize) -> Result<u32, ParseError> {
    field.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        column,
        value: field.to_string(),
    })
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("process table output is empty, expected at least a header line")]
    MissingHeader,

    #[error("line {line}: expected {expected} columns in {content:?}")]
    MissingColumns {
        line: usize,
        expected: usize,
        content: String,
    },

    #[error("line {line}: column '{column}' is not a valid number: {value:?}")]
    InvalidNumber {
        line: usize,
        column: Column,
        value: String,
    },

    #[error("line {line}: pid {pid} appears more than once")]
    DuplicatePid { line: usize, pid: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    // -------------------------------------------------------------------------
    // Tests for split_columns
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_columns_padded() {
        let fields = split_columns("abc   def   ghi", 3).unwrap();
        assert_eq!(fields, vec!["abc", "def", "ghi"]);
    }

    #[test]
    fn test_split_columns_last_column_verbatim() {
        let fields = split_columns("root 1 0 1 /bin/sh -c  'sleep 1'  ", 5).unwrap();
        assert_eq!(fields[4], "/bin/sh -c  'sleep 1'  ");
    }

    #[test]
    fn test_split_columns_leading_padding() {
        // Right-aligned numeric first column
        let fields = split_columns("  42 root cmd", 3).unwrap();
        assert_eq!(fields, vec!["42", "root", "cmd"]);
    }

    #[test]
    fn test_split_columns_too_few_fields() {
        assert!(split_columns("root 1 0", 5).is_none());
        assert!(split_columns("root 1 0 1    ", 5).is_none());
        assert!(split_columns("", 1).is_none());
    }

    // -------------------------------------------------------------------------
    // Tests for parse_table
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_table_basic() {
        let text = "USER   PID  PPID  PGID COMMAND\n\
                    root     1     0     1 /sbin/init splash\n\
                    alice  200     1   200 bash\n";
        let records = parse_table(text, &ColumnLayout::default(), at(), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].owner, "root");
        assert_eq!(records[0].command, "/sbin/init splash");
        assert_eq!(records[1].pid, 200);
        assert_eq!(records[1].parent_pid, 1);
        assert_eq!(records[1].process_group, 200);
        assert!(records[1].children.is_empty());
        assert!(records[1].started_at.is_none());
    }

    #[test]
    fn test_parse_table_skips_lister_pid() {
        let text = "USER PID PPID PGID COMMAND\n\
                    alice 10 1 10 bash\n\
                    alice 11 10 11 ps -axwwo user,pid,ppid,pgid,command\n";
        let records = parse_table(text, &ColumnLayout::default(), at(), Some(11)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pid, 10);
    }

    #[test]
    fn test_parse_table_reordered_columns() {
        let layout = ColumnLayout::from_names(&["pid", "ppid", "pgid", "user", "command"]).unwrap();
        let text = "  PID  PPID  PGID USER COMMAND\n   12     1    12 bob  vim notes.txt\n";
        let records = parse_table(text, &layout, at(), None).unwrap();
        assert_eq!(records[0].pid, 12);
        assert_eq!(records[0].owner, "bob");
        assert_eq!(records[0].command, "vim notes.txt");
    }

    #[test]
    fn test_parse_table_elapsed_seconds() {
        let layout = ColumnLayout::default().with_elapsed_seconds();
        let text = "USER PID PPID PGID ELAPSED COMMAND\nroot 5 1 5 30 sleep 100\n";
        let records = parse_table(text, &layout, at(), None).unwrap();
        assert_eq!(records[0].started_at, Some(at() - Duration::seconds(30)));
        assert_eq!(records[0].command, "sleep 100");
    }

    #[test]
    fn test_parse_table_rejects_non_numeric_pid() {
        let text = "USER PID PPID PGID COMMAND\nroot x 0 1 init\n";
        let err = parse_table(text, &ColumnLayout::default(), at(), None).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                line: 2,
                column: Column::Pid,
                value: "x".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_table_rejects_short_line() {
        let text = "USER PID PPID PGID COMMAND\nroot 1 0\n";
        assert!(matches!(
            parse_table(text, &ColumnLayout::default(), at(), None),
            Err(ParseError::MissingColumns { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_table_rejects_duplicate_pid() {
        let text = "USER PID PPID PGID COMMAND\nroot 1 0 1 a\nroot 1 0 1 b\n";
        assert_eq!(
            parse_table(text, &ColumnLayout::default(), at(), None).unwrap_err(),
            ParseError::DuplicatePid { line: 3, pid: 1 }
        );
    }

    #[test]
    fn test_parse_table_empty_input() {
        assert_eq!(
            parse_table("", &ColumnLayout::default(), at(), None).unwrap_err(),
            ParseError::MissingHeader
        );
        // Header only is a valid, empty table
        let records =
            parse_table("USER PID PPID PGID COMMAND\n", &ColumnLayout::default(), at(), None)
                .unwrap();
        assert!(records.is_empty());
    }
}
