//! Start/end detection between two consecutive selected snapshots.
//!
//! The diff only holds within one continuously sampled run: a pid that is
//! recycled between two ticks looks like the same process unless
//! [`Identity::PidAndStartTime`] is used and the table carries start times.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::process::{ProcessRecord, Snapshot};

/// Start times closer than this are treated as the same process. `etimes` is
/// truncated to whole seconds and the capture time is taken after `ps` exits,
/// so two reads of the same process can drift by a little over one second.
const START_TIME_TOLERANCE_SECS: i64 = 2;

/// What makes two records in consecutive snapshots the same process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Identity {
    /// The pid alone.
    #[default]
    Pid,
    /// The pid plus the start time, when both records have one.
    PidAndStartTime,
}

impl FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pid" => Ok(Identity::Pid),
            "pid-start-time" => Ok(Identity::PidAndStartTime),
            other => Err(format!(
                "Invalid identity '{}', expected 'pid' or 'pid-start-time'",
                other
            )),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Pid => f.write_str("pid"),
            Identity::PidAndStartTime => f.write_str("pid-start-time"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Started,
    Ended,
}

/// A process appearing in or disappearing from the selected subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub pid: u32,
    pub command: String,
    pub kind: TransitionKind,
    pub at: DateTime<Utc>,
}

impl Transition {
    fn new(record: &ProcessRecord, kind: TransitionKind, at: DateTime<Utc>) -> Self {
        Self {
            pid: record.pid,
            command: record.command.clone(),
            kind,
            at,
        }
    }
}

/// Compares two selected snapshots.
///
/// Every transition is stamped with `current.captured_at`. All `Ended`
/// events come before all `Started` events, each group ascending by pid, so a
/// reused pid always closes before it reopens.
pub fn diff(previous: &Snapshot, current: &Snapshot, identity: Identity) -> Vec<Transition> {
    let at = current.captured_at;
    let mut ended = Vec::new();
    let mut started = Vec::new();

    for (pid, old) in &previous.processes {
        match current.get(*pid) {
            None => ended.push(Transition::new(old, TransitionKind::Ended, at)),
            Some(new) if is_reused(old, new, identity) => {
                ended.push(Transition::new(old, TransitionKind::Ended, at));
                started.push(Transition::new(new, TransitionKind::Started, at));
            }
            Some(_) => {}
        }
    }

    for (pid, new) in &current.processes {
        if !previous.contains(*pid) {
            started.push(Transition::new(new, TransitionKind::Started, at));
        }
    }

    started.sort_by_key(|t| t.pid);
    ended.extend(started);
    ended
}

fn is_reused(old: &ProcessRecord, new: &ProcessRecord, identity: Identity) -> bool {
    match identity {
        Identity::Pid => false,
        Identity::PidAndStartTime => match (old.started_at, new.started_at) {
            (Some(a), Some(b)) => {
                (a - b).abs() > Duration::seconds(START_TIME_TOLERANCE_SECS)
            }
            _ => false,
        },
    }
}
