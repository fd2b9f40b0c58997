//! Command occurrence counter.
//!
//! Every command present in a tick's selection is counted once for that tick,
//! so long-running processes weigh by how long they were observed.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{Aggregator, Summary};
use crate::diff::Transition;
use crate::process::Snapshot;

/// One histogram row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandCount {
    pub count: u64,
    pub command: String,
}

#[derive(Debug, Default)]
pub struct CommandCounter {
    // Rows in first-seen order; ties keep this order after sorting.
    rows: Vec<CommandCount>,
    index: HashMap<String, usize>,
}

impl CommandCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: &str) {
        match self.index.get(command) {
            Some(&i) => self.rows[i].count += 1,
            None => {
                self.index.insert(command.to_string(), self.rows.len());
                self.rows.push(CommandCount {
                    count: 1,
                    command: command.to_string(),
                });
            }
        }
    }

    /// Rows sorted by count, highest first.
    pub fn rows(&self) -> Vec<CommandCount> {
        let mut rows: Vec<CommandCount> =
            self.rows.iter().filter(|r| r.count > 0).cloned().collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }
}

impl Aggregator for CommandCounter {
    fn observe(&mut self, selected: &Snapshot, _transitions: &[Transition]) {
        for process in selected.processes.values() {
            self.record(&process.command);
        }
    }

    fn finish(&mut self, _at: DateTime<Utc>) -> Summary {
        Summary::Counts(self.rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_sorted_descending() {
        let mut counter = CommandCounter::new();
        for cmd in ["a", "b", "a", "c", "a", "b"] {
            counter.record(cmd);
        }
        let rows = counter.rows();
        assert_eq!(
            rows.iter()
                .map(|r| (r.count, r.command.as_str()))
                .collect::<Vec<_>>(),
            vec![(3, "a"), (2, "b"), (1, "c")]
        );
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let mut counter = CommandCounter::new();
        for cmd in ["zeta", "alpha", "mid"] {
            counter.record(cmd);
        }
        let names: Vec<String> = counter.rows().into_iter().map(|r| r.command).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
