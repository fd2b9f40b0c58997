//! Integration tests for process table parsing and tree linking.
//!
//! These tests exercise the public parsing API with realistic `ps` output,
//! including padding, reordered columns and malformed lines.

use chrono::{DateTime, Utc};
use pstree_prof::{
    build_tree, parse_table, snapshot_from_text, ColumnLayout, ParseError, ProcessRecord,
};

fn at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Real `ps -axwwo user,pid,ppid,pgid,command` output shape.
const PS_OUTPUT: &str = "\
USER         PID    PPID    PGID COMMAND
root           1       0       1 /sbin/init splash
root         512       1     512 /usr/sbin/sshd -D
alice       4001     512    4001 -bash
alice       4100    4001    4100 make -j4 all
alice       4101    4100    4100 /bin/sh -c cc -O2 -c  main.c
alice       4102    4101    4100 cc -O2 -c main.c
";

/// Renders records back into padded columns.
fn render(records: &[ProcessRecord]) -> String {
    let mut out = String::from("USER PID PPID PGID COMMAND\n");
    for r in records {
        out.push_str(&format!(
            "{:<10} {:>7} {:>7} {:>7} {}\n",
            r.owner, r.pid, r.parent_pid, r.process_group, r.command
        ));
    }
    out
}

#[test]
fn test_parses_one_record_per_line() {
    let records = parse_table(PS_OUTPUT, &ColumnLayout::default(), at(), None).unwrap();
    assert_eq!(records.len(), 6);

    let mut pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
    pids.dedup();
    assert_eq!(pids.len(), 6);

    let sh = records.iter().find(|r| r.pid == 4101).unwrap();
    // Command is taken verbatim, including the double space
    assert_eq!(sh.command, "/bin/sh -c cc -O2 -c  main.c");
    assert_eq!(sh.process_group, 4100);
}

#[test]
fn test_rendered_records_parse_back_identically() {
    let records = parse_table(PS_OUTPUT, &ColumnLayout::default(), at(), None).unwrap();
    let reparsed = parse_table(&render(&records), &ColumnLayout::default(), at(), None).unwrap();
    assert_eq!(records, reparsed);
}

#[test]
fn test_trailing_blank_line_is_ignored() {
    let with_blank = format!("{PS_OUTPUT}\n");
    let a = parse_table(PS_OUTPUT, &ColumnLayout::default(), at(), None).unwrap();
    let b = parse_table(&with_blank, &ColumnLayout::default(), at(), None).unwrap();
    assert_eq!(a, b);

    let without_newline = PS_OUTPUT.trim_end_matches('\n');
    let c = parse_table(without_newline, &ColumnLayout::default(), at(), None).unwrap();
    assert_eq!(a, c);
}

#[test]
fn test_non_numeric_pid_fails_whole_table() {
    let broken = PS_OUTPUT.replace("4102", "41O2");
    let err = parse_table(&broken, &ColumnLayout::default(), at(), None).unwrap_err();
    assert!(matches!(err, ParseError::InvalidNumber { line: 7, .. }));
}

#[test]
fn test_tree_links_every_present_parent() {
    let tree = snapshot_from_text(PS_OUTPUT, &ColumnLayout::default(), at(), None).unwrap();

    assert_eq!(tree.captured_at, at());
    assert_eq!(tree.get(1).unwrap().children, vec![512]);
    assert_eq!(tree.get(4100).unwrap().children, vec![4101]);
    assert_eq!(tree.get(4101).unwrap().children, vec![4102]);
    // pid 0 is not in the table, so init has no parent entry
    assert!(!tree.contains(0));

    for record in tree.processes.values() {
        if let Some(parent) = tree.get(record.parent_pid) {
            assert!(parent.children.contains(&record.pid));
        }
    }
}

#[test]
fn test_build_tree_is_independent_of_snapshot_iteration() {
    let records = parse_table(PS_OUTPUT, &ColumnLayout::default(), at(), None).unwrap();
    let mut reversed = records.clone();
    reversed.reverse();

    let a = build_tree(records, at());
    let b = build_tree(reversed, at());
    // Same edges, even if sibling order differs
    for (pid, record) in &a.processes {
        let mut x = record.children.clone();
        let mut y = b.get(*pid).unwrap().children.clone();
        x.sort_unstable();
        y.sort_unstable();
        assert_eq!(x, y);
    }
}
