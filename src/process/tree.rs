//! Links parsed records into a parent -> children tree.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::process::record::{ProcessRecord, Snapshot};

/// Builds a snapshot from parsed records, filling in each record's children.
///
/// A record is added to its parent's children only when the parent is part of
/// the same table. Children keep the order of the input records. Records whose
/// parent is absent stay in the snapshot as the top of their own subtree.
pub fn build_tree(records: Vec<ProcessRecord>, captured_at: DateTime<Utc>) -> Snapshot {
    let links: Vec<(u32, u32)> = records.iter().map(|r| (r.parent_pid, r.pid)).collect();

    let mut processes: BTreeMap<u32, ProcessRecord> =
        records.into_iter().map(|r| (r.pid, r)).collect();

    for (parent_pid, pid) in links {
        // pid 0 parents itself on some systems
        if parent_pid == pid {
            continue;
        }
        if let Some(parent) = processes.get_mut(&parent_pid) {
            parent.children.push(pid);
        }
    }

    Snapshot {
        captured_at,
        processes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, parent_pid: u32) -> ProcessRecord {
        ProcessRecord {
            owner: "root".into(),
            pid,
            parent_pid,
            process_group: pid,
            command: format!("cmd-{pid}"),
            started_at: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn test_children_follow_input_order() {
        let records = vec![record(1, 0), record(30, 1), record(20, 1), record(40, 30)];
        let snapshot = build_tree(records, Utc::now());

        assert_eq!(snapshot.get(1).unwrap().children, vec![30, 20]);
        assert_eq!(snapshot.get(30).unwrap().children, vec![40]);
        assert!(snapshot.get(20).unwrap().children.is_empty());
    }

    #[test]
    fn test_child_listed_iff_parent_present() {
        let records = vec![record(2, 1), record(3, 2), record(5, 4)];
        let snapshot = build_tree(records, Utc::now());

        for rec in snapshot.processes.values() {
            let in_parent = snapshot
                .get(rec.parent_pid)
                .map(|p| p.children.contains(&rec.pid));
            match in_parent {
                Some(listed) => assert!(listed, "pid {} missing from parent", rec.pid),
                None => assert!(!snapshot.contains(rec.parent_pid)),
            }
        }
        assert_eq!(snapshot.get(2).unwrap().children, vec![3]);
        assert!(!snapshot.contains(4));
    }

    #[test]
    fn test_self_parent_is_not_a_child() {
        let snapshot = build_tree(vec![record(0, 0), record(1, 0)], Utc::now());
        assert_eq!(snapshot.get(0).unwrap().children, vec![1]);
    }
}
