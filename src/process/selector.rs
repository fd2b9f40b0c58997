//! Breadth-first selection of the subtree of interest.

use ahash::AHashSet as HashSet;
use std::collections::{BTreeMap, VecDeque};

use crate::process::record::Snapshot;

/// How the roots of the traversal are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootRule {
    /// The single process with this pid, if it exists.
    ExactPid(u32),
    /// Every process whose command line contains this substring.
    CommandContains(String),
}

/// Selects the processes reachable from a root set.
#[derive(Debug, Clone)]
pub struct SubtreeSelector {
    rule: RootRule,
    excluded: HashSet<u32>,
    // Children of excluded processes that are still walked.
    kept: HashSet<u32>,
}

impl SubtreeSelector {
    pub fn new(rule: RootRule) -> Self {
        Self {
            rule,
            excluded: HashSet::new(),
            kept: HashSet::new(),
        }
    }

    /// Leaves `pid` out of every selection: it is never a root and never
    /// selected. Of its descendants only the children in `keep` (and their
    /// subtrees) are still walked.
    ///
    /// Used for the profiler itself, which must not show up when a process
    /// that started it matches the pattern.
    pub fn exclude(mut self, pid: u32, keep: impl IntoIterator<Item = u32>) -> Self {
        self.excluded.insert(pid);
        self.kept.extend(keep);
        self
    }

    /// Root pids for this snapshot, ascending.
    pub fn roots(&self, tree: &Snapshot) -> Vec<u32> {
        match &self.rule {
            RootRule::ExactPid(pid) => {
                if tree.contains(*pid) {
                    vec![*pid]
                } else {
                    Vec::new()
                }
            }
            RootRule::CommandContains(pattern) => tree
                .processes
                .values()
                .filter(|p| !self.excluded.contains(&p.pid))
                .filter(|p| p.command.contains(pattern.as_str()))
                .map(|p| p.pid)
                .collect(),
        }
    }

    /// Returns the selected snapshot: every record reachable from a root.
    ///
    /// An empty root set yields an empty snapshot stamped with the tree's
    /// capture time.
    pub fn select(&self, tree: &Snapshot) -> Snapshot {
        let mut selected = BTreeMap::new();
        let mut visited = HashSet::new();
        // Depth is carried along but does not affect the result.
        let mut queue: VecDeque<(u32, usize)> =
            self.roots(tree).into_iter().map(|pid| (pid, 0)).collect();

        while let Some((pid, depth)) = queue.pop_front() {
            if !visited.insert(pid) {
                continue;
            }
            let Some(record) = tree.get(pid) else {
                continue;
            };
            if self.excluded.contains(&pid) {
                for child in record.children.iter().filter(|c| self.kept.contains(c)) {
                    queue.push_back((*child, depth + 1));
                }
                continue;
            }
            for child in &record.children {
                queue.push_back((*child, depth + 1));
            }
            selected.insert(pid, record.clone());
        }

        Snapshot {
            captured_at: tree.captured_at,
            processes: selected,
        }
    }
}
